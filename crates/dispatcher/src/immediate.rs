use std::sync::Arc;

use taskgate_domain::{BackendStatus, SchedulerError, SchedulerResult, Task};
use taskgate_worker::{ResultDispatcher, TaskProcessor};
use tracing::{debug, info};

use crate::policy::SchedulingPolicy;

/// 即时策略：每个被接受的活动任务只执行一次，不保留任何任务，因此无需取消调度
pub struct ImmediatePolicy {
    dispatcher: ResultDispatcher,
    processor: Arc<dyn TaskProcessor>,
}

impl ImmediatePolicy {
    pub fn new(dispatcher: ResultDispatcher, processor: Arc<dyn TaskProcessor>) -> Self {
        Self {
            dispatcher,
            processor,
        }
    }
}

impl SchedulingPolicy for ImmediatePolicy {
    fn new_task(&self, mut task: Task) -> SchedulerResult<()> {
        task.validate()?;

        if !task.is_active() {
            debug!(
                "忽略非活动任务 {} (状态: {})，即时策略不保留任务",
                task.primary_task_id().unwrap_or("<无ID>"),
                task.state
            );
            return Ok(());
        }

        task.validate_deliverable()?;
        let callback_uri = task
            .callback_uri()
            .map(str::to_string)
            .ok_or_else(|| SchedulerError::invalid_task("缺少回调地址"))?;
        task.mark_backends(BackendStatus::Completed);

        info!("立即执行 {}", task.entity_description());
        self.dispatcher
            .dispatch(task, Arc::clone(&self.processor), callback_uri)
    }

    fn name(&self) -> &str {
        "Immediate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mocks::*;
    use chrono::Utc;
    use taskgate_domain::{Condition, TaskState, CONDITION_KEY_TIME_INTERVAL};

    #[test]
    fn test_active_task_is_dispatched_once_off_thread() {
        let pool = test_pool();
        let client = Arc::new(MockCallbackClient::new());
        let policy = ImmediatePolicy::new(dispatcher(&pool, client.clone()), processor());

        let task = TaskBuilder::new("parking-1")
            .with_condition(Condition::new().with_entry(CONDITION_KEY_TIME_INTERVAL, "30"))
            .build();
        policy.new_task(task).unwrap();
        pool.release();

        let posts = client.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].uri, "http://origin.test/callback");
        assert_ne!(posts[0].thread, std::thread::current().id());
        let body: serde_json::Value = serde_json::from_slice(&posts[0].payload.body).unwrap();
        assert_eq!(body["task_ids"][0], "parking-1");
        assert_eq!(body["backends"][0]["status"], "COMPLETED");
    }

    #[test]
    fn test_delivery_failure_does_not_reach_submitter() {
        let pool = test_pool();
        let client = Arc::new(MockCallbackClient::failing());
        let policy = ImmediatePolicy::new(dispatcher(&pool, client.clone()), processor());

        assert!(policy
            .new_task(TaskBuilder::new("t").with_output("a").build())
            .is_ok());
        pool.release();
        assert_eq!(client.posts().len(), 1);
    }

    #[test]
    fn test_inactive_task_is_ignored() {
        let pool = test_pool();
        let client = Arc::new(MockCallbackClient::new());
        let policy = ImmediatePolicy::new(dispatcher(&pool, client.clone()), processor());

        let task = TaskBuilder::new("")
            .with_state(TaskState::Inactive)
            .with_output("a")
            .build();
        policy.new_task(task).unwrap();
        pool.release();
        assert!(client.posts().is_empty());
    }

    #[test]
    fn test_invalid_task_is_rejected() {
        let pool = test_pool();
        let client = Arc::new(MockCallbackClient::new());
        let policy = ImmediatePolicy::new(dispatcher(&pool, client.clone()), processor());

        let result = policy.new_task(TaskBuilder::new("t").build());
        assert!(matches!(result, Err(SchedulerError::InvalidTask(_))));
        pool.release();
        assert!(client.posts().is_empty());
    }

    #[test]
    fn test_active_task_without_backends_is_rejected() {
        let pool = test_pool();
        let client = Arc::new(MockCallbackClient::new());
        let policy = ImmediatePolicy::new(dispatcher(&pool, client.clone()), processor());

        let mut task = TaskBuilder::new("t").with_output("a").build();
        task.backends.clear();
        assert!(matches!(
            policy.new_task(task),
            Err(SchedulerError::InvalidTask(_))
        ));

        let mut inactive = TaskBuilder::new("t")
            .with_state(TaskState::Inactive)
            .with_output("a")
            .build();
        inactive.backends.clear();
        inactive.callback_uri = None;
        assert!(policy.new_task(inactive).is_ok());

        pool.release();
        assert!(client.posts().is_empty());
    }

    #[test]
    fn test_closed_pool_is_reported() {
        let pool = test_pool();
        let policy = ImmediatePolicy::new(
            dispatcher(&pool, Arc::new(MockCallbackClient::new())),
            processor(),
        );
        pool.release();

        let result = policy.new_task(TaskBuilder::new("t").with_output("a").build());
        assert!(matches!(result, Err(SchedulerError::PoolClosed)));
    }

    #[test]
    fn test_nothing_to_tick() {
        let pool = test_pool();
        let policy = ImmediatePolicy::new(
            dispatcher(&pool, Arc::new(MockCallbackClient::new())),
            processor(),
        );
        assert!(!policy.is_recurring());
        assert_eq!(policy.tick(Utc::now(), None).evaluated(), 0);
        pool.release();
    }
}
