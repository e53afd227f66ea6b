pub mod callback;
pub mod pool;
pub mod processors;
pub mod result_dispatcher;

pub use callback::{
    CallbackClient, CallbackResponse, HttpCallbackClient, ResultPayload, CONTENT_TYPE_JSON,
};
pub use pool::{WorkerHandle, WorkerPool};
pub use processors::{StatusReportProcessor, TaskProcessor};
pub use result_dispatcher::{DispatchOutcome, ResultDispatcher};
