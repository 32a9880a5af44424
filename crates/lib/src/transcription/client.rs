//! Transcription service client: `/upload-url`, presigned PUT, and `/agent`.

use super::envelope::AgentReply;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("transcription request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("transcription api error: {0}")]
    Api(String),
    #[error("upload-url response has no s3_uri")]
    MissingStorageUri,
}

/// Write credential returned by `/upload-url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub presigned_url: String,
    pub s3_uri: String,
}

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    #[serde(default)]
    presigned_url: Option<String>,
    #[serde(default)]
    s3_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadUrlRequest<'a> {
    filename: &'a str,
    filetype: &'a str,
}

/// Body of a `/agent` call. Serialized as a single-field object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AgentRequest {
    /// Stored audio object (mp3, webm).
    Media { s3_uri: String },
    /// Stored Word document.
    Document { s3_uri_docx: String },
    /// Free text.
    Text { mensaje: String },
}

/// Remote operations the upload orchestrator needs.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    async fn request_upload_url(
        &self,
        filename: &str,
        filetype: &str,
    ) -> Result<UploadTarget, TranscriptionError>;

    /// PUT raw bytes to a presigned URL. Returns the HTTP status code; only transport failures are errors.
    async fn put_object(
        &self,
        url: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<u16, TranscriptionError>;

    async fn agent(&self, request: &AgentRequest) -> Result<AgentReply, TranscriptionError>;
}

/// HTTP client for the transcription service.
#[derive(Clone)]
pub struct TranscriptionClient {
    base_url: String,
    client: reqwest::Client,
}

impl TranscriptionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TranscriptionBackend for TranscriptionClient {
    /// POST /upload-url — request a presigned write URL for `filename`.
    async fn request_upload_url(
        &self,
        filename: &str,
        filetype: &str,
    ) -> Result<UploadTarget, TranscriptionError> {
        let url = format!("{}/upload-url", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&UploadUrlRequest { filename, filetype })
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(TranscriptionError::Api(format!("{} {}", status, body)));
        }
        let data: UploadUrlResponse = res.json().await?;
        let s3_uri = data
            .s3_uri
            .filter(|s| !s.is_empty())
            .ok_or(TranscriptionError::MissingStorageUri)?;
        let presigned_url = data
            .presigned_url
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TranscriptionError::Api("upload-url response has no presigned_url".to_string()))?;
        Ok(UploadTarget {
            presigned_url,
            s3_uri,
        })
    }

    async fn put_object(
        &self,
        url: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<u16, TranscriptionError> {
        let res = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        Ok(res.status().as_u16())
    }

    /// POST /agent — process a stored object or a text message.
    async fn agent(&self, request: &AgentRequest) -> Result<AgentReply, TranscriptionError> {
        let url = format!("{}/agent", self.base_url);
        let res = self.client.post(&url).json(request).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(TranscriptionError::Api(format!("{} {}", status, body)));
        }
        let data: serde_json::Value = res.json().await?;
        Ok(AgentReply::from_value(data))
    }
}
