use std::sync::Arc;
use std::time::Instant;

use taskgate_domain::{SchedulerResult, Task};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::callback::CallbackClient;
use crate::pool::WorkerHandle;
use crate::processors::TaskProcessor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { status: u16 },
    DeliveryFailed,
    ProduceFailed,
}

/// Runs task processing on the worker pool and POSTs the result to the
/// callback URI. Delivery is best effort and at most once: failures are
/// logged and never reach the submitter.
#[derive(Clone)]
pub struct ResultDispatcher {
    pool: WorkerHandle,
    client: Arc<dyn CallbackClient>,
}

impl ResultDispatcher {
    pub fn new(pool: WorkerHandle, client: Arc<dyn CallbackClient>) -> Self {
        Self { pool, client }
    }

    /// Fails only when the pool no longer accepts work.
    pub fn dispatch(
        &self,
        task: Task,
        processor: Arc<dyn TaskProcessor>,
        callback_uri: String,
    ) -> SchedulerResult<()> {
        self.dispatch_tracked(task, processor, callback_uri)
            .map(|_| ())
    }

    pub fn dispatch_tracked(
        &self,
        task: Task,
        processor: Arc<dyn TaskProcessor>,
        callback_uri: String,
    ) -> SchedulerResult<JoinHandle<DispatchOutcome>> {
        let dispatch_id = Uuid::new_v4();
        let client = Arc::clone(&self.client);
        debug!(
            "Submitting dispatch {} for task {:?} to {}",
            dispatch_id,
            task.primary_task_id(),
            callback_uri
        );
        self.pool.spawn(async move {
            deliver(dispatch_id, task, processor, client, callback_uri).await
        })
    }
}

async fn deliver(
    dispatch_id: Uuid,
    task: Task,
    processor: Arc<dyn TaskProcessor>,
    client: Arc<dyn CallbackClient>,
    callback_uri: String,
) -> DispatchOutcome {
    let started = Instant::now();
    let task_id = task.primary_task_id().unwrap_or("<unknown>").to_string();

    let payload = match processor.produce(&task).await {
        Ok(payload) => payload,
        Err(e) => {
            error!(
                %dispatch_id,
                "Processor {} failed for task {}: {}",
                processor.name(),
                task_id,
                e
            );
            return DispatchOutcome::ProduceFailed;
        }
    };

    match client.post(&callback_uri, &payload).await {
        Ok(response) => {
            info!(
                %dispatch_id,
                "Delivered result of task {} ({} bytes) to {} in {:?}: HTTP {} {}",
                task_id,
                payload.len(),
                callback_uri,
                started.elapsed(),
                response.status,
                response.body
            );
            DispatchOutcome::Delivered {
                status: response.status,
            }
        }
        Err(e) => {
            warn!(
                %dispatch_id,
                "Failed to send task finished for task {}: {}", task_id, e
            );
            DispatchOutcome::DeliveryFailed
        }
    }
}
