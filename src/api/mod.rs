//! Client for the CodeTracker HTTP API.

use crate::diff::Change;
use crate::transcript::ConversationText;
use log::debug;
use reqwest::blocking::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

// ===================================================================
// Snapshot ids
// ===================================================================

/// Server-assigned snapshot id. The server may send it as a JSON string or
/// a number; either way it is held as its decimal/text form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for SnapshotId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Text(String),
            Number(serde_json::Number),
            Null(()),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Text(s) => SnapshotId(s),
            Wire::Number(n) => SnapshotId(n.to_string()),
            Wire::Null(()) => SnapshotId::default(),
        })
    }
}

// ===================================================================
// Request / response bodies
// ===================================================================

#[derive(Debug, Serialize)]
pub struct CreateSnapshotRequest<'a> {
    pub project_hash: &'a str,
    pub message: String,
    pub changes: &'a [Change],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claude_session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_snapshot_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSnapshotResponse {
    #[serde(default)]
    pub snapshot_id: SnapshotId,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct CreateInteractionRequest<'a> {
    pub project_hash: &'a str,
    pub message: String,
    pub changes: &'a [Change],
    pub parent_snapshot_id: &'a str,
    pub claude_session_id: &'a str,
    pub started_at: &'a str,
    pub ended_at: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_start_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_end_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInteractionResponse {
    #[serde(default)]
    pub snapshot_id: SnapshotId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationEntry {
    pub entry_type: String,
    pub entry_data: String,
}

impl From<ConversationText> for ConversationEntry {
    fn from(text: ConversationText) -> Self {
        Self {
            entry_type: text.role.as_str().to_string(),
            entry_data: text.content,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendConversationsRequest<'a> {
    pub project_hash: &'a str,
    pub session_id: &'a str,
    pub entries: Vec<ConversationEntry>,
}

/// Ids of the first and last stored conversation entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SendConversationsResponse {
    pub start_id: i64,
    pub end_id: i64,
}

// ===================================================================
// Client
// ===================================================================

/// Stateless JSON-over-HTTP client. No retries.
pub struct Client {
    base_url: String,
    api_key: String,
    http: HttpClient,
}

impl Client {
    pub fn new(server_url: &str, api_key: &str) -> Result<Self, ApiError> {
        let http = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: server_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }

    pub fn create_snapshot(
        &self,
        req: &CreateSnapshotRequest<'_>,
    ) -> Result<CreateSnapshotResponse, ApiError> {
        self.post("/api/snapshots", req)
    }

    pub fn create_interaction(
        &self,
        req: &CreateInteractionRequest<'_>,
    ) -> Result<CreateInteractionResponse, ApiError> {
        self.post("/api/interactions", req)
    }

    pub fn send_conversations(
        &self,
        req: &SendConversationsRequest<'_>,
    ) -> Result<SendConversationsResponse, ApiError> {
        self.post("/api/conversations", req)
    }

    fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("POST {url}");

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-API-Key", &self.api_key)
            .json(body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}
