use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use taskgate_domain::{
    BackendStatus, ConditionParser, GeoPoint, SchedulerError, SchedulerResult, Task,
    TriggerDecision, TriggerSet,
};
use taskgate_worker::{ResultDispatcher, TaskProcessor};
use tracing::{debug, error, info};

use crate::policy::{SchedulingPolicy, TickReport};

#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub task: Task,
    pub triggers: TriggerSet,
}

impl ScheduledTask {
    pub fn new(task: Task, triggers: TriggerSet) -> Self {
        Self { task, triggers }
    }
}

/// 任务ID到任务及触发状态的映射，提交和调度检查共用同一把锁
#[derive(Debug, Default)]
pub struct PeriodicSchedule {
    entries: Mutex<HashMap<String, ScheduledTask>>,
}

impl PeriodicSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ScheduledTask>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 返回 `true` 表示替换了已有记录
    pub fn insert(&self, task_id: &str, entry: ScheduledTask) -> bool {
        self.lock().insert(task_id.to_string(), entry).is_some()
    }

    /// 返回 `true` 表示记录存在并已移除
    pub fn remove(&self, task_id: &str) -> bool {
        self.lock().remove(task_id).is_some()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.lock().contains_key(task_id)
    }

    pub fn get(&self, task_id: &str) -> Option<ScheduledTask> {
        self.lock().get(task_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 检查所有记录并返回已触发任务的快照。
    ///
    /// 过期的记录被移除；没有设置间隔的记录在首次触发后同样被移除。
    pub fn evaluate(
        &self,
        now: DateTime<Utc>,
        position: Option<&GeoPoint>,
    ) -> (Vec<Task>, TickReport) {
        let mut entries = self.lock();
        let mut report = TickReport::default();
        let mut fired = Vec::new();
        let mut expired = Vec::new();
        let mut completed = Vec::new();

        for (task_id, entry) in entries.iter_mut() {
            match entry.triggers.evaluate(now, position) {
                TriggerDecision::Fire => {
                    fired.push(entry.task.clone());
                    if !entry.triggers.is_recurring() {
                        completed.push(task_id.clone());
                    }
                }
                TriggerDecision::Wait => report.waiting += 1,
                TriggerDecision::Expired => expired.push(task_id.clone()),
            }
        }

        for task_id in &expired {
            entries.remove(task_id);
            info!("任务 {} 的有效期已结束，已从调度中移除", task_id);
        }
        for task_id in &completed {
            entries.remove(task_id);
            info!("任务 {} 没有重复间隔，首次触发后已从调度中移除", task_id);
        }

        report.fired = fired.len();
        report.expired = expired.len();
        report.completed = completed.len();
        (fired, report)
    }
}

/// 周期调度策略：活动任务保留在调度表中，每次检查时触发条件满足即执行
pub struct PeriodicPolicy {
    schedule: PeriodicSchedule,
    parser: ConditionParser,
    dispatcher: ResultDispatcher,
    processor: Arc<dyn TaskProcessor>,
}

impl PeriodicPolicy {
    pub fn new(
        parser: ConditionParser,
        dispatcher: ResultDispatcher,
        processor: Arc<dyn TaskProcessor>,
    ) -> Self {
        Self {
            schedule: PeriodicSchedule::new(),
            parser,
            dispatcher,
            processor,
        }
    }

    pub fn schedule(&self) -> &PeriodicSchedule {
        &self.schedule
    }

    pub fn is_scheduled(&self, task_id: &str) -> bool {
        self.schedule.contains(task_id)
    }

    pub fn len(&self) -> usize {
        self.schedule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }

    fn schedule_task(&self, task_id: String, task: Task) -> SchedulerResult<()> {
        // 先解析再写入，解析失败时保留旧记录
        let conditions = task.conditions.as_deref().unwrap_or_default();
        let triggers = self.parser.parse_all(conditions)?;
        let trigger_count = triggers.len();

        if self.schedule.insert(&task_id, ScheduledTask::new(task, triggers)) {
            info!("任务 {} 已更新，触发状态已重置", task_id);
        } else {
            info!("任务 {} 已加入周期调度 ({} 个触发条件)", task_id, trigger_count);
        }
        Ok(())
    }

    fn unschedule_task(&self, task_id: &str) {
        if self.schedule.remove(task_id) {
            info!("任务 {} 已从周期调度中移除", task_id);
        } else {
            debug!("任务 {} 不在调度中，无需移除", task_id);
        }
    }
}

impl SchedulingPolicy for PeriodicPolicy {
    fn new_task(&self, task: Task) -> SchedulerResult<()> {
        task.validate()?;

        let task_id = task
            .primary_task_id()
            .map(str::to_string)
            .ok_or_else(|| {
                SchedulerError::invalid_task_id(format!(
                    "无法调度或移除没有主ID的任务: {:?}",
                    task.task_ids
                ))
            })?;

        if task.is_active() {
            task.validate_deliverable()?;
            self.schedule_task(task_id, task)
        } else {
            debug!("任务 {} 状态为 {}，取消调度", task_id, task.state);
            self.unschedule_task(&task_id);
            Ok(())
        }
    }

    fn name(&self) -> &str {
        "Periodic"
    }

    fn tick(&self, now: DateTime<Utc>, position: Option<&GeoPoint>) -> TickReport {
        let (fired, mut report) = self.schedule.evaluate(now, position);

        for mut task in fired {
            let task_id = task.primary_task_id().unwrap_or_default().to_string();
            let Some(callback_uri) = task.callback_uri().map(str::to_string) else {
                error!("任务 {} 缺少回调地址，跳过投递", task_id);
                report.rejected += 1;
                continue;
            };
            task.mark_backends(BackendStatus::Executing);

            if let Err(e) = self
                .dispatcher
                .dispatch(task, Arc::clone(&self.processor), callback_uri)
            {
                error!("任务 {} 提交到工作线程池失败: {}", task_id, e);
                report.rejected += 1;
            }
        }

        if report.evaluated() > 0 {
            debug!(
                "调度检查完成: 触发 {}, 等待 {}, 过期 {}, 完成 {}, 拒绝 {}",
                report.fired,
                report.waiting,
                report.expired,
                report.completed,
                report.rejected
            );
        }
        report
    }

    fn is_recurring(&self) -> bool {
        true
    }
}
