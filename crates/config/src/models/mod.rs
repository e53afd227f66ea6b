pub mod app_config;
pub mod observability;
pub mod scheduler;
pub mod worker_pool;

pub use app_config::*;
pub use observability::*;
pub use scheduler::*;
pub use worker_pool::*;
