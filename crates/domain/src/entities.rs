use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use taskgate_errors::{SchedulerError, SchedulerResult};

/// 任务状态，由源服务指定
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskState {
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "INACTIVE")]
    Inactive,
    #[serde(rename = "ARCHIVED")]
    Archived,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Active => "ACTIVE",
            TaskState::Inactive => "INACTIVE",
            TaskState::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 后端执行状态
///
/// 不强制状态转换表：重新下发的任务可以从 `Completed` 或 `Error` 回到 `NotStarted`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BackendStatus {
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "NOT_STARTED")]
    NotStarted,
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "EXECUTING")]
    Executing,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "ERROR")]
    Error,
}

impl BackendStatus {
    pub fn code(&self) -> i32 {
        match self {
            BackendStatus::Unknown => 0,
            BackendStatus::NotStarted => 1,
            BackendStatus::Pending => 2,
            BackendStatus::Executing => 3,
            BackendStatus::Completed => 4,
            BackendStatus::Error => 5,
        }
    }

    pub fn from_code(code: i64) -> SchedulerResult<Self> {
        match code {
            0 => Ok(BackendStatus::Unknown),
            1 => Ok(BackendStatus::NotStarted),
            2 => Ok(BackendStatus::Pending),
            3 => Ok(BackendStatus::Executing),
            4 => Ok(BackendStatus::Completed),
            5 => Ok(BackendStatus::Error),
            _ => Err(SchedulerError::InvalidStatusCode(code)),
        }
    }

    /// 实际上的终止状态，但之后仍允许重新赋值
    pub fn is_finished(&self) -> bool {
        matches!(self, BackendStatus::Completed | BackendStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendStatus::Unknown => "UNKNOWN",
            BackendStatus::NotStarted => "NOT_STARTED",
            BackendStatus::Pending => "PENDING",
            BackendStatus::Executing => "EXECUTING",
            BackendStatus::Completed => "COMPLETED",
            BackendStatus::Error => "ERROR",
        }
    }
}

impl TryFrom<i64> for BackendStatus {
    type Error = SchedulerError;

    fn try_from(code: i64) -> Result<Self, SchedulerError> {
        BackendStatus::from_code(code)
    }
}

impl From<BackendStatus> for i32 {
    fn from(status: BackendStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务在单个后端上的状态记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskBackend {
    pub backend_id: Option<i64>,
    pub status: Option<BackendStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskBackend {
    /// 新接受的后端记录，初始状态为 `NotStarted`
    pub fn new(backend_id: i64) -> Self {
        Self::with_status(backend_id, BackendStatus::NotStarted)
    }

    pub fn with_status(backend_id: i64, status: BackendStatus) -> Self {
        Self {
            backend_id: Some(backend_id),
            status: Some(status),
            message: None,
        }
    }

    pub fn set_status(&mut self, status: BackendStatus) {
        self.status = Some(status);
    }

    pub fn is_valid(&self) -> bool {
        self.backend_id.is_some() && self.status.is_some()
    }
}

/// 请求的输出特征，例如 `sensor/location`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Output {
    pub feature: String,
}

impl Output {
    pub fn new<S: Into<String>>(feature: S) -> Self {
        Self {
            feature: feature.into(),
        }
    }
}

/// 一组触发条件键值对，例如 `time/interval = 60`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Condition {
    pub entries: BTreeMap<String, String>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 由任务接入层交给调度核心的数据采集任务
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub task_ids: Vec<String>,
    pub state: TaskState,
    #[serde(default)]
    pub backends: Vec<TaskBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<Output>>,
}

impl Task {
    pub fn new<S: Into<String>>(task_id: S, state: TaskState) -> Self {
        Self {
            task_ids: vec![task_id.into()],
            state,
            backends: Vec::new(),
            callback_uri: None,
            conditions: None,
            outputs: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, TaskState::Active)
    }

    /// 第一个任务ID，去除空白后为空则不可用作调度键
    pub fn primary_task_id(&self) -> Option<&str> {
        self.task_ids
            .first()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
    }

    pub fn has_conditions(&self) -> bool {
        self.conditions.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn has_outputs(&self) -> bool {
        self.outputs.as_ref().is_some_and(|o| !o.is_empty())
    }

    pub fn callback_uri(&self) -> Option<&str> {
        self.callback_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }

    /// 结构校验：有任务ID，且已有的后端记录都带ID和状态
    pub fn is_structurally_valid(&self) -> bool {
        !self.task_ids.is_empty() && self.backends.iter().all(TaskBackend::is_valid)
    }

    /// 提交时校验：结构有效，并且带有触发条件或输出之一。
    ///
    /// 取消调度的请求也走这里，所以不要求后端记录和回调地址，
    /// 这两项由 [`validate_deliverable`](Self::validate_deliverable) 在活动路径上检查。
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.task_ids.is_empty() {
            return Err(SchedulerError::invalid_task("缺少任务ID"));
        }
        if let Some(backend) = self.backends.iter().find(|b| !b.is_valid()) {
            return Err(SchedulerError::invalid_task(format!(
                "后端记录缺少ID或状态: {backend:?}"
            )));
        }
        if !self.has_conditions() && !self.has_outputs() {
            return Err(SchedulerError::invalid_task("任务既没有触发条件也没有输出"));
        }
        Ok(())
    }

    /// 活动任务需要能够投递结果：至少一个后端记录和一个回调地址
    pub fn validate_deliverable(&self) -> SchedulerResult<()> {
        if self.backends.is_empty() {
            return Err(SchedulerError::invalid_task("缺少后端记录"));
        }
        if self.callback_uri().is_none() {
            return Err(SchedulerError::invalid_task("缺少回调地址"));
        }
        Ok(())
    }

    pub fn backend_ids(&self) -> Vec<i64> {
        self.backends.iter().filter_map(|b| b.backend_id).collect()
    }

    /// 将所有后端记录设置为同一状态
    pub fn mark_backends(&mut self, status: BackendStatus) {
        for backend in &mut self.backends {
            backend.set_status(status);
        }
    }

    pub fn entity_description(&self) -> String {
        format!(
            "任务 '{}' (状态: {}, 后端: {:?})",
            self.primary_task_id().unwrap_or("<无ID>"),
            self.state,
            self.backend_ids()
        )
    }
}
