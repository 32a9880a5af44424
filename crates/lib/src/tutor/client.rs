//! Tutor chat client: a single `POST /chat`.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    #[error("tutor request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("tutor api error: {0}")]
    Api(String),
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_id: String,
    /// Trimmed text, or "" when only an image is sent.
    pub message: String,
    /// Base64 image bytes (no data-URL header), or null.
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Success,
    Invalid,
    WaitingForId,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    #[serde(default = "unknown_status")]
    pub status: ChatStatus,
    #[serde(default)]
    pub message: Option<String>,
    /// Identity as the server normalized it.
    #[serde(default)]
    pub user_id: Option<String>,
}

fn unknown_status() -> ChatStatus {
    ChatStatus::Unknown
}

/// Client for the tutor chat endpoint.
#[derive(Clone)]
pub struct TutorClient {
    chat_url: String,
    client: reqwest::Client,
}

impl TutorClient {
    pub fn new(chat_url: impl Into<String>) -> Self {
        Self {
            chat_url: chat_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// POST the request and decode the status envelope.
    pub async fn send(&self, request: &ChatRequest) -> Result<ChatReply, TutorError> {
        log::debug!("tutor chat for {}", request.user_id);
        let res = self.client.post(&self.chat_url).json(request).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(TutorError::Api(format!("{} {}", status, body)));
        }
        Ok(res.json().await?)
    }
}
