pub mod models;
pub mod validation;

pub use models::{
    AppConfig, AreaConfig, CallbackConfig, ObservabilityConfig, PolicyKind, SchedulerConfig,
    WorkerPoolConfig,
};
pub use validation::{ConfigValidator, ValidationUtils};

/// Configuration error type
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for taskgate_domain::SchedulerError {
    fn from(err: ConfigError) -> Self {
        taskgate_domain::SchedulerError::Configuration(err.to_string())
    }
}
