use crate::validation::{ConfigValidator, ValidationUtils};
use crate::ConfigResult;
use serde::{Deserialize, Serialize};

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
pub const LOG_FORMATS: [&str; 2] = ["json", "pretty"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ConfigValidator for ObservabilityConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_one_of(&self.log_level, "observability.log_level", &LOG_LEVELS)?;
        ValidationUtils::validate_one_of(
            &self.log_format,
            "observability.log_format",
            &LOG_FORMATS,
        )?;
        Ok(())
    }
}
