pub mod conditions;
pub mod entities;
pub mod geo;
pub mod triggers;

pub use conditions::*;
pub use entities::*;
pub use geo::*;
pub use triggers::*;
pub use taskgate_errors::{SchedulerError, SchedulerResult};
