use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use taskgate_domain::{GeoPoint, SchedulerResult};
use taskgate_worker::WorkerHandle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::policy::SchedulingPolicy;

/// 周期性执行策略调度检查的定时器，所有检查在同一循环中串行执行，互不重叠
pub struct TickDriver {
    policy: Arc<dyn SchedulingPolicy>,
    period: Duration,
    position: Option<GeoPoint>,
}

impl TickDriver {
    pub fn new(
        policy: Arc<dyn SchedulingPolicy>,
        period: Duration,
        position: Option<GeoPoint>,
    ) -> Self {
        Self {
            policy,
            period,
            position,
        }
    }

    /// 立即执行第一次检查，之后每个周期执行一次，直到收到关闭信号。
    /// 返回已执行的检查次数
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> u64 {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = 0u64;

        info!(
            "调度检查循环已启动 (策略: {}, 间隔: {:?})",
            self.policy.name(),
            self.period
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.policy.tick(Utc::now(), self.position.as_ref());
                    ticks += 1;
                    debug!("第 {} 次调度检查: {:?}", ticks, report);
                }
                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，调度检查循环停止 (共 {} 次)", ticks);
                    break;
                }
            }
        }
        ticks
    }

    pub fn spawn(
        self,
        pool: &WorkerHandle,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> SchedulerResult<JoinHandle<u64>> {
        pool.spawn(self.run(shutdown_rx))
    }
}
