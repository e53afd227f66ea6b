use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use taskgate_config::CallbackConfig;
use taskgate_domain::{SchedulerError, SchedulerResult};
use tracing::debug;

pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// Serialized result of a task together with its declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPayload {
    pub body: Vec<u8>,
    pub content_type: String,
}

impl ResultPayload {
    pub fn new<B: Into<Vec<u8>>, C: Into<String>>(body: B, content_type: C) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.into(),
        }
    }

    pub fn json<T: Serialize>(value: &T) -> SchedulerResult<Self> {
        Ok(Self::new(serde_json::to_vec(value)?, CONTENT_TYPE_JSON))
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResponse {
    pub status: u16,
    pub body: String,
}

/// Outbound HTTP capability used for result delivery.
#[async_trait]
pub trait CallbackClient: Send + Sync {
    /// POSTs the payload to `uri`. Transport errors and non-2xx responses are
    /// both reported as [`SchedulerError::DeliveryFailure`].
    async fn post(&self, uri: &str, payload: &ResultPayload) -> SchedulerResult<CallbackResponse>;
}

pub struct HttpCallbackClient {
    http_client: reqwest::Client,
}

impl HttpCallbackClient {
    pub fn new(config: &CallbackConfig) -> SchedulerResult<Self> {
        // no idle pooling: every delivery gets its own connection, released
        // once the response body has been read
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| SchedulerError::config_error(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl CallbackClient for HttpCallbackClient {
    async fn post(&self, uri: &str, payload: &ResultPayload) -> SchedulerResult<CallbackResponse> {
        debug!("Calling URI: POST {}", uri);

        let response = self
            .http_client
            .post(uri)
            .header(reqwest::header::CONTENT_TYPE, payload.content_type.as_str())
            .body(payload.body.clone())
            .send()
            .await
            .map_err(|e| SchedulerError::delivery_failure(uri, e.to_string()))?;

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!("Failed to read response body from {}: {}", uri, e);
                String::new()
            }
        };

        if status.is_success() {
            Ok(CallbackResponse {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(SchedulerError::delivery_failure(
                uri,
                format!("HTTP {status} - {body}"),
            ))
        }
    }
}
