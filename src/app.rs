use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use taskgate_config::AppConfig;
use taskgate_dispatcher::{build_policy, SchedulingPolicy, TickDriver};
use taskgate_domain::{ConditionParser, SchedulerResult, Task};
use taskgate_worker::{
    CallbackClient, HttpCallbackClient, ResultDispatcher, StatusReportProcessor, WorkerHandle,
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// 主应用程序
pub struct Application {
    config: AppConfig,
    pool: WorkerHandle,
    policy: Arc<dyn SchedulingPolicy>,
}

impl Application {
    /// 使用HTTP回调客户端创建应用实例
    pub fn new(config: AppConfig, pool: WorkerHandle) -> Result<Self> {
        let client =
            HttpCallbackClient::new(&config.callback).context("创建回调HTTP客户端失败")?;
        Self::with_callback_client(config, pool, Arc::new(client))
    }

    pub fn with_callback_client(
        config: AppConfig,
        pool: WorkerHandle,
        client: Arc<dyn CallbackClient>,
    ) -> Result<Self> {
        info!("初始化应用程序，调度策略: {:?}", config.scheduler.policy);

        let areas = config.scheduler.named_areas();
        info!("已加载 {} 个命名区域", areas.len());
        let parser = ConditionParser::new(config.scheduler.default_geofence_radius_km)
            .with_areas(Arc::new(areas));

        let dispatcher = ResultDispatcher::new(pool.clone(), client);
        let policy = build_policy(
            config.scheduler.policy,
            parser,
            dispatcher,
            Arc::new(StatusReportProcessor::new()),
        );

        Ok(Self {
            config,
            pool,
            policy,
        })
    }

    pub fn policy(&self) -> Arc<dyn SchedulingPolicy> {
        Arc::clone(&self.policy)
    }

    pub fn submit(&self, task: Task) -> SchedulerResult<()> {
        self.policy.new_task(task)
    }

    /// 提交一批任务，被拒绝的任务只记录日志。返回被接受的任务数。
    pub fn submit_all(&self, tasks: Vec<Task>) -> usize {
        let total = tasks.len();
        let mut accepted = 0;
        for task in tasks {
            let description = task.entity_description();
            match self.submit(task) {
                Ok(()) => accepted += 1,
                Err(e) => warn!("拒绝{}: {}", description, e),
            }
        }
        info!("已提交 {}/{} 个任务", accepted, total);
        accepted
    }

    /// 运行直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if !self.policy.is_recurring() {
            info!("{} 策略无需周期检查，等待关闭信号", self.policy.name());
            let _ = shutdown_rx.recv().await;
            return Ok(());
        }

        let position = self.config.scheduler.reference_point()?;
        let driver = TickDriver::new(
            self.policy(),
            Duration::from_secs(self.config.scheduler.task_check_interval_seconds),
            position,
        );
        let handle = driver
            .spawn(&self.pool, shutdown_rx)
            .context("启动调度检查循环失败")?;

        match handle.await {
            Ok(ticks) => {
                info!("调度检查循环已退出，共执行 {} 次检查", ticks);
                Ok(())
            }
            Err(e) => {
                error!("调度检查循环异常退出: {e}");
                Err(e.into())
            }
        }
    }
}

/// 从JSON文件读取任务列表
pub fn load_tasks(path: &Path) -> Result<Vec<Task>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("读取任务文件失败: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("解析任务文件失败: {}", path.display()))
}
