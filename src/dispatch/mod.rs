pub mod dispatch_handlers;
pub mod dispatch_job;
pub mod scheduler;
pub mod store;

pub use dispatch_job::{DispatchJob, DispatchSettings};
pub use scheduler::start_dispatch_scheduler;
pub use store::PgDispatchStore;
