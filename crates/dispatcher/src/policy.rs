use std::sync::Arc;

use chrono::{DateTime, Utc};
use taskgate_config::PolicyKind;
use taskgate_domain::{ConditionParser, GeoPoint, SchedulerResult, Task};
use taskgate_worker::{ResultDispatcher, TaskProcessor};
use tracing::info;

use crate::immediate::ImmediatePolicy;
use crate::periodic::PeriodicPolicy;

/// 一次调度检查的结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub fired: usize,
    pub waiting: usize,
    pub expired: usize,
    /// 没有重复间隔、首次触发后移除的任务，同时计入 `fired`
    pub completed: usize,
    /// 工作线程池拒绝的已触发任务
    pub rejected: usize,
}

impl TickReport {
    pub fn evaluated(&self) -> usize {
        self.fired + self.waiting + self.expired
    }
}

/// 决定任务到达或更新时如何处理
///
/// `new_task` 不等待任务执行，工作交给线程池后立即返回
pub trait SchedulingPolicy: Send + Sync {
    fn new_task(&self, task: Task) -> SchedulerResult<()>;

    fn name(&self) -> &str;

    /// 重新检查保留的任务，不保留任务的策略返回空结果
    fn tick(&self, _now: DateTime<Utc>, _position: Option<&GeoPoint>) -> TickReport {
        TickReport::default()
    }

    /// 策略是否需要周期性的调度检查循环
    fn is_recurring(&self) -> bool {
        false
    }
}

pub fn build_policy(
    kind: PolicyKind,
    parser: ConditionParser,
    dispatcher: ResultDispatcher,
    processor: Arc<dyn TaskProcessor>,
) -> Arc<dyn SchedulingPolicy> {
    let policy: Arc<dyn SchedulingPolicy> = match kind {
        PolicyKind::Periodic => Arc::new(PeriodicPolicy::new(parser, dispatcher, processor)),
        PolicyKind::Immediate => Arc::new(ImmediatePolicy::new(dispatcher, processor)),
    };
    info!("使用调度策略: {}", policy.name());
    policy
}
