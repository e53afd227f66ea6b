#[cfg(test)]
pub mod mocks {
    use std::sync::{Arc, Mutex};
    use std::thread::ThreadId;

    use async_trait::async_trait;
    use taskgate_config::WorkerPoolConfig;
    use taskgate_domain::{
        Condition, Output, SchedulerError, SchedulerResult, Task, TaskBackend, TaskState,
    };
    use taskgate_worker::{
        CallbackClient, CallbackResponse, ResultDispatcher, ResultPayload, StatusReportProcessor,
        WorkerPool,
    };

    #[derive(Debug, Clone)]
    pub struct RecordedPost {
        pub uri: String,
        pub payload: ResultPayload,
        pub thread: ThreadId,
    }

    #[derive(Default)]
    pub struct MockCallbackClient {
        pub posts: Arc<Mutex<Vec<RecordedPost>>>,
        pub fail: bool,
    }

    impl MockCallbackClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn posts(&self) -> Vec<RecordedPost> {
            self.posts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CallbackClient for MockCallbackClient {
        async fn post(
            &self,
            uri: &str,
            payload: &ResultPayload,
        ) -> SchedulerResult<CallbackResponse> {
            self.posts.lock().unwrap().push(RecordedPost {
                uri: uri.to_string(),
                payload: payload.clone(),
                thread: std::thread::current().id(),
            });
            if self.fail {
                return Err(SchedulerError::delivery_failure(uri, "connection reset"));
            }
            Ok(CallbackResponse {
                status: 200,
                body: "OK".to_string(),
            })
        }
    }

    pub fn test_pool() -> WorkerPool {
        WorkerPool::acquire(&WorkerPoolConfig {
            worker_threads: 2,
            thread_name: "policy-test".to_string(),
            shutdown_timeout_seconds: 5,
        })
        .unwrap()
    }

    pub fn dispatcher(pool: &WorkerPool, client: Arc<MockCallbackClient>) -> ResultDispatcher {
        ResultDispatcher::new(pool.handle(), client)
    }

    pub fn processor() -> Arc<StatusReportProcessor> {
        Arc::new(StatusReportProcessor::new())
    }

    pub struct TaskBuilder {
        task: Task,
    }

    impl TaskBuilder {
        pub fn new(task_id: &str) -> Self {
            let mut task = Task::new(task_id, TaskState::Active);
            task.backends.push(TaskBackend::new(1));
            task.callback_uri = Some("http://origin.test/callback".to_string());
            Self { task }
        }

        pub fn with_state(mut self, state: TaskState) -> Self {
            self.task.state = state;
            self
        }

        pub fn with_condition(mut self, condition: Condition) -> Self {
            self.task
                .conditions
                .get_or_insert_with(Vec::new)
                .push(condition);
            self
        }

        pub fn with_output(mut self, feature: &str) -> Self {
            self.task
                .outputs
                .get_or_insert_with(Vec::new)
                .push(Output::new(feature));
            self
        }

        pub fn build(self) -> Task {
            self.task
        }
    }
}
