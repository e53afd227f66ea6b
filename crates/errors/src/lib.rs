use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("无效的任务: {0}")]
    InvalidTask(String),
    #[error("无效的任务ID: {0}")]
    InvalidTaskId(String),
    #[error("无效的状态码: {0}")]
    InvalidStatusCode(i64),
    #[error("无效的触发条件: {key}={value} - {message}")]
    InvalidCondition {
        key: String,
        value: String,
        message: String,
    },
    #[error("结果投递失败: {uri} - {message}")]
    DeliveryFailure { uri: String, message: String },
    #[error("工作线程池已关闭")]
    PoolClosed,
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("任务执行错误: {0}")]
    TaskExecution(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    pub fn invalid_task<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTask(msg.into())
    }
    pub fn invalid_task_id<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTaskId(msg.into())
    }
    pub fn invalid_condition<K, V, M>(key: K, value: V, message: M) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        M: Into<String>,
    {
        Self::InvalidCondition {
            key: key.into(),
            value: value.into(),
            message: message.into(),
        }
    }
    pub fn delivery_failure<U: Into<String>, M: Into<String>>(uri: U, message: M) -> Self {
        Self::DeliveryFailure {
            uri: uri.into(),
            message: message.into(),
        }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    /// 同步校验类错误，提交方必须在任务被接受之前处理
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            SchedulerError::InvalidTask(_)
                | SchedulerError::InvalidTaskId(_)
                | SchedulerError::InvalidStatusCode(_)
                | SchedulerError::InvalidCondition { .. }
        )
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::Internal(_)
                | SchedulerError::Configuration(_)
                | SchedulerError::PoolClosed
        )
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Internal(err.to_string())
    }
}
