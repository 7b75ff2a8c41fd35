//! HTTP collaborator store.
//!
//! Talks JSON to the console's REST backend. Timeouts, connection failures, 408, 429
//! and 5xx responses are transient; every other non-success status is a rejection.

use super::{FetchTicket, ListQuery, QueueStore, RawItem, TransitionRequest};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::record::AuditNote;
use crate::types::QueueKind;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// REST collection backing each queue
fn collection(kind: QueueKind) -> &'static str {
    match kind {
        QueueKind::Support => "support-tickets",
        QueueKind::AccountDeletion => "account-deletion-requests",
    }
}

pub struct HttpQueueStore {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpQueueStore {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        api_token: Option<String>,
    ) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Decode(format!("invalid store URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Decode(format!(
                "store URL {base_url} cannot carry a path"
            )));
        }
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transient(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::new(
            &config.base_url,
            Duration::from_millis(config.timeout_ms),
            config.api_token.clone(),
        )
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, StoreError> {
        let request = match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await.map_err(map_http_error)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status, message));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl QueueStore for HttpQueueStore {
    async fn list(
        &self,
        kind: QueueKind,
        query: &ListQuery,
        ticket: &FetchTicket,
    ) -> Result<Vec<RawItem>, StoreError> {
        if ticket.is_cancelled() {
            debug!(%kind, generation = ticket.generation(), "Skipping cancelled list request");
            return Ok(Vec::new());
        }
        let mut request = self.client.get(self.url(&[collection(kind)]));
        if let Some(status) = query.status {
            request = request.query(&[("status", status.as_wire())]);
        }
        let body = self.send(request).await?;
        if ticket.is_cancelled() {
            debug!(%kind, generation = ticket.generation(), "Dropping list response for cancelled fetch");
            return Ok(Vec::new());
        }
        list_items(body)
    }

    async fn get(&self, kind: QueueKind, id: &str) -> Result<RawItem, StoreError> {
        self.send(self.client.get(self.url(&[collection(kind), id])))
            .await
    }

    async fn transition(
        &self,
        kind: QueueKind,
        id: &str,
        request: &TransitionRequest,
    ) -> Result<RawItem, StoreError> {
        self.send(
            self.client
                .patch(self.url(&[collection(kind), id]))
                .json(request),
        )
        .await
    }

    async fn append_note(
        &self,
        kind: QueueKind,
        id: &str,
        note: &AuditNote,
    ) -> Result<RawItem, StoreError> {
        self.send(
            self.client
                .post(self.url(&[collection(kind), id, "notes"]))
                .json(note),
        )
        .await
    }

    async fn remove(&self, subject_id: &str) -> Result<(), StoreError> {
        self.send(self.client.delete(self.url(&["users", subject_id])))
            .await
            .map(|_| ())
    }

    fn store_name(&self) -> &str {
        "http"
    }
}

/// Accept a bare array or an envelope with `items`/`data`
fn list_items(body: Value) -> Result<Vec<RawItem>, StoreError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut envelope) => match envelope
            .remove("items")
            .or_else(|| envelope.remove("data"))
        {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(StoreError::Decode(
                "list response has no items array".to_string(),
            )),
        },
        Value::Null => Ok(Vec::new()),
        _ => Err(StoreError::Decode(
            "list response is not an array".to_string(),
        )),
    }
}

fn classify_status(status: StatusCode, message: String) -> StoreError {
    let code = status.as_u16();
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        StoreError::Transient(format!("status {code}: {message}"))
    } else if status == StatusCode::NOT_FOUND {
        StoreError::NotFound(message)
    } else {
        StoreError::Rejected {
            status: code,
            message,
        }
    }
}

fn map_http_error(error: reqwest::Error) -> StoreError {
    if error.is_timeout() {
        StoreError::Transient(format!("request timeout: {error}"))
    } else if error.is_connect() {
        StoreError::Transient(format!("connection error: {error}"))
    } else if error.is_request() || error.is_body() {
        StoreError::Transient(format!("request failed: {error}"))
    } else if error.is_decode() {
        StoreError::Decode(error.to_string())
    } else {
        StoreError::Transient(format!("HTTP error: {error}"))
    }
}
