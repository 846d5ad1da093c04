//! JSON-over-HTTP resource manager clients.
//!
//! Endpoints, relative to a resource manager's base URL:
//!
//! | call        | request                         | success body                 |
//! |-------------|---------------------------------|------------------------------|
//! | prepare     | `POST /prepare {payload}`       | `{entityId, transactionId}`  |
//! | commit      | `POST /commit/{transactionId}`  | any                          |
//! | abort       | `POST /abort/{transactionId}`   | any                          |
//! | execute     | `POST /execute {payload}`       | `{id, status}`               |
//! | compensate  | `POST /compensate/{id}`         | any                          |

use std::time::Duration;

use async_trait::async_trait;
use common::{Resource, ResourcePayload, TransactionId};
use reqwest::Url;
use serde::Deserialize;

use crate::error::ParticipantError;
use crate::saga::{ExecutionReceipt, SagaParticipant};
use crate::two_phase::{PrepareResult, PreparedTransaction, TwoPhaseParticipant};

/// Base URL, timeout and connection pool shared by both client flavours.
#[derive(Debug, Clone)]
struct Endpoint {
    resource: Resource,
    base_url: Url,
    timeout: Duration,
    client: reqwest::Client,
}

impl Endpoint {
    fn new(resource: Resource, base_url: &str, timeout: Duration) -> Result<Self, ParticipantError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ParticipantError::InvalidEndpoint(format!("failed to build client: {e}")))?;
        Self::with_client(resource, base_url, timeout, client)
    }

    fn with_client(
        resource: Resource,
        base_url: &str,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Result<Self, ParticipantError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ParticipantError::InvalidEndpoint(format!("{base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(ParticipantError::InvalidEndpoint(base_url.to_string()));
        }
        Ok(Self {
            resource,
            base_url: parsed,
            timeout,
            client,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn post_json(
        &self,
        url: Url,
        payload: &ResourcePayload,
    ) -> Result<reqwest::Response, ParticipantError> {
        tracing::debug!(resource = %self.resource, %url, "POST");
        self.send(self.client.post(url).json(payload)).await
    }

    async fn post_empty(&self, url: Url) -> Result<reqwest::Response, ParticipantError> {
        tracing::debug!(resource = %self.resource, %url, "POST");
        self.send(self.client.post(url)).await
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ParticipantError> {
        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let details = response.text().await.unwrap_or_default();
        Err(ParticipantError::Rejected {
            status: status.as_u16(),
            details,
        })
    }

    fn classify(&self, err: reqwest::Error) -> ParticipantError {
        if err.is_timeout() {
            ParticipantError::Timeout(self.timeout)
        } else if err.is_decode() {
            ParticipantError::Decode(err.to_string())
        } else {
            ParticipantError::Transport(err.to_string())
        }
    }
}

/// Two-phase commit client for one resource manager.
#[derive(Debug, Clone)]
pub struct HttpTwoPhaseParticipant {
    endpoint: Endpoint,
}

impl HttpTwoPhaseParticipant {
    /// Creates a client with its own connection pool.
    pub fn new(
        resource: Resource,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ParticipantError> {
        Ok(Self {
            endpoint: Endpoint::new(resource, base_url, timeout)?,
        })
    }

    /// Creates a client reusing an existing connection pool.
    pub fn with_client(
        resource: Resource,
        base_url: &str,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Result<Self, ParticipantError> {
        Ok(Self {
            endpoint: Endpoint::with_client(resource, base_url, timeout, client)?,
        })
    }
}

#[async_trait]
impl TwoPhaseParticipant for HttpTwoPhaseParticipant {
    fn resource(&self) -> Resource {
        self.endpoint.resource
    }

    async fn prepare(&self, payload: &ResourcePayload) -> PrepareResult {
        let url = self.endpoint.url(&["prepare"]);
        let response = self.endpoint.post_json(url, payload).await?;
        response
            .json::<PreparedTransaction>()
            .await
            .map_err(|e| self.endpoint.classify(e))
    }

    async fn commit(&self, transaction_id: &TransactionId) -> Result<(), ParticipantError> {
        let url = self.endpoint.url(&["commit", transaction_id.as_str()]);
        self.endpoint.post_empty(url).await.map(|_| ())
    }

    async fn abort(&self, transaction_id: &TransactionId) -> Result<(), ParticipantError> {
        let url = self.endpoint.url(&["abort", transaction_id.as_str()]);
        self.endpoint.post_empty(url).await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    id: serde_json::Value,
    #[serde(default)]
    status: Option<String>,
}

impl TryFrom<ExecuteResponse> for ExecutionReceipt {
    type Error = ParticipantError;

    fn try_from(response: ExecuteResponse) -> Result<Self, Self::Error> {
        let id = match response.id {
            serde_json::Value::String(id) => id,
            serde_json::Value::Number(id) => id.to_string(),
            other => {
                return Err(ParticipantError::Decode(format!(
                    "expected a string or numeric id, got {other}"
                )));
            }
        };
        Ok(ExecutionReceipt {
            id,
            status: response.status,
        })
    }
}

/// Saga client for one resource manager.
#[derive(Debug, Clone)]
pub struct HttpSagaParticipant {
    endpoint: Endpoint,
}

impl HttpSagaParticipant {
    /// Creates a client with its own connection pool.
    pub fn new(
        resource: Resource,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ParticipantError> {
        Ok(Self {
            endpoint: Endpoint::new(resource, base_url, timeout)?,
        })
    }

    /// Creates a client reusing an existing connection pool.
    pub fn with_client(
        resource: Resource,
        base_url: &str,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Result<Self, ParticipantError> {
        Ok(Self {
            endpoint: Endpoint::with_client(resource, base_url, timeout, client)?,
        })
    }
}

#[async_trait]
impl SagaParticipant for HttpSagaParticipant {
    fn resource(&self) -> Resource {
        self.endpoint.resource
    }

    async fn execute(&self, payload: &ResourcePayload) -> Result<ExecutionReceipt, ParticipantError> {
        let url = self.endpoint.url(&["execute"]);
        let response = self.endpoint.post_json(url, payload).await?;
        let body = response
            .json::<ExecuteResponse>()
            .await
            .map_err(|e| self.endpoint.classify(e))?;
        ExecutionReceipt::try_from(body)
    }

    async fn compensate(&self, id: &str) -> Result<(), ParticipantError> {
        let url = self.endpoint.url(&["compensate", id]);
        self.endpoint.post_empty(url).await.map(|_| ())
    }
}
