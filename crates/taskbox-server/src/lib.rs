pub mod routes;
pub mod sweeper;
#[cfg(test)]
pub mod test_helpers;

use anyhow::Result;
use taskbox_service::LocalService;
use tokio::net::TcpListener;

pub async fn serve(listener: TcpListener, service: LocalService) -> Result<()> {
    let app = routes::build_router(service);
    axum::serve(listener, app).await?;
    Ok(())
}
