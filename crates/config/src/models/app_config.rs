use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    observability::ObservabilityConfig,
    scheduler::SchedulerConfig,
    worker_pool::{CallbackConfig, WorkerPoolConfig},
};
use crate::validation::ConfigValidator;

pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/taskgate.toml",
    "taskgate.toml",
    "/etc/taskgate/config.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub worker_pool: WorkerPoolConfig,
    pub callback: CallbackConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("scheduler.policy", "periodic")?
            .set_default(
                "scheduler.task_check_interval_seconds",
                defaults.scheduler.task_check_interval_seconds as i64,
            )?
            .set_default(
                "scheduler.default_geofence_radius_km",
                defaults.scheduler.default_geofence_radius_km,
            )?
            .set_default(
                "worker_pool.worker_threads",
                defaults.worker_pool.worker_threads as i64,
            )?
            .set_default("worker_pool.thread_name", defaults.worker_pool.thread_name)?
            .set_default(
                "worker_pool.shutdown_timeout_seconds",
                defaults.worker_pool.shutdown_timeout_seconds as i64,
            )?
            .set_default(
                "callback.request_timeout_seconds",
                defaults.callback.request_timeout_seconds as i64,
            )?
            .set_default(
                "callback.connect_timeout_seconds",
                defaults.callback.connect_timeout_seconds as i64,
            )?
            .set_default("callback.user_agent", defaults.callback.user_agent)?
            .set_default("observability.log_level", defaults.observability.log_level)?
            .set_default("observability.log_format", defaults.observability.log_format)?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("TASKGATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.scheduler.validate()?;
        self.worker_pool.validate()?;
        self.callback.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
