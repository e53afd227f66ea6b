use crate::validation::{ConfigValidator, ValidationUtils};
use crate::ConfigResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    pub worker_threads: usize,
    pub thread_name: String,
    pub shutdown_timeout_seconds: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            thread_name: "taskgate-worker".to_string(),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl ConfigValidator for WorkerPoolConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_count(self.worker_threads, "worker_pool.worker_threads", 512)?;
        ValidationUtils::validate_not_empty(&self.thread_name, "worker_pool.thread_name")?;
        ValidationUtils::validate_timeout(
            self.shutdown_timeout_seconds,
            "worker_pool.shutdown_timeout_seconds",
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    pub request_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            connect_timeout_seconds: 10,
            user_agent: concat!("taskgate/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ConfigValidator for CallbackConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_timeout(
            self.request_timeout_seconds,
            "callback.request_timeout_seconds",
        )?;
        ValidationUtils::validate_timeout(
            self.connect_timeout_seconds,
            "callback.connect_timeout_seconds",
        )?;
        ValidationUtils::validate_not_empty(&self.user_agent, "callback.user_agent")?;
        Ok(())
    }
}
