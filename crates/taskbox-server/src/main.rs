use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use taskbox_service::LocalService;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "taskbox-server", about = "Task service with file attachments")]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "TASKBOX_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on.
    #[arg(long, env = "TASKBOX_PORT", default_value_t = 4000)]
    port: u16,

    /// Seconds between expired-record sweeps.
    #[arg(long, env = "TASKBOX_SWEEP_INTERVAL_SECS", default_value_t = 3600)]
    sweep_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let tasks = taskbox_db::create_store(&taskbox_db::DbConfig::from_env())?;

    let store_config = taskbox_store::StoreConfig::from_env();
    if store_config.is_s3() {
        info!(
            "object store: s3 bucket {}",
            store_config.bucket.as_deref().unwrap_or_default()
        );
    } else {
        info!("object store: local filesystem");
    }
    let objects = taskbox_store::create_store(&store_config)?;

    let notify_config = taskbox_notify::NotifyConfig::from_env();
    if notify_config.topic_url.is_none() {
        info!("notifications disabled (TASKBOX_NOTIFY_URL not set)");
    }
    let notifier = taskbox_notify::create_notifier(&notify_config);

    tokio::spawn(taskbox_server::sweeper::run_sweeper(
        tasks.clone(),
        cli.sweep_interval_secs,
    ));

    let service = LocalService::new(tasks, objects, notifier);

    let addr = SocketAddr::new(cli.bind.parse()?, cli.port);
    let listener = TcpListener::bind(addr).await?;
    info!("taskbox-server listening on http://{addr}");

    taskbox_server::serve(listener, service).await
}
