mod local;
mod reconcile;
mod traits;

pub use local::LocalService;
pub use reconcile::{ReconcileError, ReconcilePlan};
pub use traits::{ServiceError, TaskService, UploadedFile};
