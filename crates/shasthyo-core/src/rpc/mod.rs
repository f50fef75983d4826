//! RPC client for the triage backend.
//!
//! The engine consumes the backend through the [`RpcClient`] trait so
//! reconciliation and the façade can be tested against deterministic
//! fakes. [`HttpRpcClient`] is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ActionPayload, Consultation, ProfileDraft, Symptom, SyncQueueItem, TriageRequest,
    TriageResult, UserId, UserProfile,
};
use crate::util::{compact_text, normalize_text_option};

/// Errors from backend calls, split into transient and permanent classes
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Invalid RPC configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Server error: {0} ({1})")]
    Server(String, u16),
    #[error("Server rejected request: {0} ({1})")]
    Rejected(String, u16),
    #[error("Invalid response payload: {0}")]
    InvalidPayload(String),
}

impl RpcError {
    /// Transient failures are retried with backoff; permanent ones are
    /// terminal for the action that caused them.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport(_) | Self::Server(..))
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::InvalidPayload(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

/// One item of a `/sync` batch. Carries the idempotency key minted at
/// enqueue time so the server can recognize a retried submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    pub idempotency_key: Uuid,
    #[serde(flatten)]
    pub payload: ActionPayload,
}

impl From<&SyncQueueItem> for SyncEnvelope {
    fn from(item: &SyncQueueItem) -> Self {
        Self {
            idempotency_key: item.idempotency_key,
            payload: item.payload.clone(),
        }
    }
}

/// Per-item outcome reported by the `/sync` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAckStatus {
    /// Applied by the server
    Acked,
    /// Already applied earlier; the previous acknowledgment was lost
    Duplicate,
    /// Permanently rejected (validation failure)
    Rejected,
}

impl SyncAckStatus {
    /// Both a fresh ack and a deduplicated retry mean the action took
    /// effect exactly once.
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Acked | Self::Duplicate)
    }
}

/// Acknowledgment for one sync envelope, addressed by idempotency key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAck {
    pub idempotency_key: Uuid,
    pub status: SyncAckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The backend surface consumed by the engine.
///
/// Transport concerns (signing, base-URL resolution, HTTP retries) are
/// owned by the implementation, not by callers.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// `GET /symptoms`
    async fn fetch_symptoms(&self) -> RpcResult<Vec<Symptom>>;

    /// `POST /users`
    async fn create_profile(&self, draft: &ProfileDraft) -> RpcResult<UserProfile>;

    /// `GET /users/{id}`
    async fn fetch_profile(&self, user_id: UserId) -> RpcResult<UserProfile>;

    /// `PUT /users/{id}`
    async fn update_profile(&self, profile: &UserProfile) -> RpcResult<UserProfile>;

    /// `POST /triage` — the authoritative triage path
    async fn triage(&self, request: &TriageRequest) -> RpcResult<TriageResult>;

    /// `GET /consultations/{user_id}`
    async fn fetch_consultations(&self, user_id: UserId) -> RpcResult<Vec<Consultation>>;

    /// `POST /sync` — the reconciliation endpoint; items are individually
    /// acknowledged or rejected
    async fn sync(&self, items: &[SyncEnvelope]) -> RpcResult<Vec<SyncAck>>;
}

/// Production reqwest-based client
#[derive(Clone)]
pub struct HttpRpcClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRpcClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RpcResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Health probe endpoint for the connectivity monitor
    pub fn health_url(&self) -> String {
        self.url("/health")
    }

    async fn check(response: reqwest::Response) -> RpcResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = parse_api_error(status, &body);
        if status.is_server_error() {
            Err(RpcError::Server(message, status.as_u16()))
        } else {
            Err(RpcError::Rejected(message, status.as_u16()))
        }
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn fetch_symptoms(&self) -> RpcResult<Vec<Symptom>> {
        let response = self.client.get(self.url("/symptoms")).send().await?;
        let payload: SymptomsResponse = Self::check(response).await?.json().await?;
        Ok(payload.symptoms)
    }

    async fn create_profile(&self, draft: &ProfileDraft) -> RpcResult<UserProfile> {
        let response = self
            .client
            .post(self.url("/users"))
            .json(draft)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn fetch_profile(&self, user_id: UserId) -> RpcResult<UserProfile> {
        let response = self
            .client
            .get(self.url(&format!("/users/{user_id}")))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn update_profile(&self, profile: &UserProfile) -> RpcResult<UserProfile> {
        let response = self
            .client
            .put(self.url(&format!("/users/{}", profile.id)))
            .json(&ProfileDraft {
                age: profile.age,
                gender: profile.gender,
                location: profile.location.clone(),
            })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn triage(&self, request: &TriageRequest) -> RpcResult<TriageResult> {
        let response = self
            .client
            .post(self.url("/triage"))
            .json(request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn fetch_consultations(&self, user_id: UserId) -> RpcResult<Vec<Consultation>> {
        let response = self
            .client
            .get(self.url(&format!("/consultations/{user_id}")))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn sync(&self, items: &[SyncEnvelope]) -> RpcResult<Vec<SyncAck>> {
        let response = self
            .client
            .post(self.url("/sync"))
            .json(&SyncRequest { items })
            .send()
            .await?;
        let payload: SyncResponse = Self::check(response).await?.json().await?;
        Ok(payload.results)
    }
}

#[derive(Deserialize)]
struct SymptomsResponse {
    symptoms: Vec<Symptom>,
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    items: &'a [SyncEnvelope],
}

#[derive(Deserialize)]
struct SyncResponse {
    results: Vec<SyncAck>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.detail.or(payload.message).or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        compact_text(trimmed)
    }
}

fn normalize_base_url(raw: String) -> RpcResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        RpcError::InvalidConfiguration("base URL must not be empty".to_string())
    })?;
    if base_url.starts_with("http://") || base_url.starts_with("https://") {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(RpcError::InvalidConfiguration(
            "base URL must include http:// or https://".to_string(),
        ))
    }
}
