use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use taskgate_domain::{Output, SchedulerResult, Task, TaskBackend};

use crate::callback::ResultPayload;

/// Produces the result that is delivered to a task's callback URI.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn produce(&self, task: &Task) -> SchedulerResult<ResultPayload>;

    fn name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct TaskReport<'a> {
    task_ids: &'a [String],
    backends: &'a [TaskBackend],
    #[serde(skip_serializing_if = "Option::is_none")]
    outputs: Option<&'a [Output]>,
    reported_at: DateTime<Utc>,
}

/// Reports the per-backend status of a task as JSON.
#[derive(Debug, Default, Clone)]
pub struct StatusReportProcessor;

impl StatusReportProcessor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskProcessor for StatusReportProcessor {
    async fn produce(&self, task: &Task) -> SchedulerResult<ResultPayload> {
        let report = TaskReport {
            task_ids: &task.task_ids,
            backends: &task.backends,
            outputs: task.outputs.as_deref(),
            reported_at: Utc::now(),
        };
        ResultPayload::json(&report)
    }

    fn name(&self) -> &str {
        "StatusReport"
    }
}
