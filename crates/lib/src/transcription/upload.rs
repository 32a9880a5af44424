//! Attachments and the three-step upload: credential, presigned PUT, processing call.

use super::client::{AgentRequest, TranscriptionBackend, TranscriptionError};
use super::envelope::AgentReply;
use std::fmt;
use std::path::{Path, PathBuf};

/// Blocking notice for files outside the accepted set.
pub const UNSUPPORTED_FILE_NOTICE: &str = "Solo se aceptan archivos .mp3, .webm o .docx";

/// Notice when `/upload-url` answers without a storage URI.
pub const MISSING_STORAGE_NOTICE: &str = "Error: no se pudo obtener la URL de S3.";

/// Generic notice for network and parsing failures.
pub const SEND_FAILED_NOTICE: &str = "Ocurrió un error al enviar el mensaje.";

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Accepted upload types, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Mp3,
    Webm,
    Docx,
}

impl FileKind {
    /// Classify by the text after the last `.` (case-insensitive). A name without a dot is
    /// its own extension, so a file called `mp3` is accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = name.rsplit('.').next().unwrap_or(name);
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "webm" => Some(Self::Webm),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    /// `filetype` sent to `/upload-url`.
    pub fn filetype(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Webm => "webm",
            Self::Docx => "docx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Webm => "audio/webm",
            Self::Docx => DOCX_MIME,
        }
    }

    /// Field name that carries the storage URI in the `/agent` body.
    pub fn discriminator(self) -> &'static str {
        match self {
            Self::Mp3 | Self::Webm => "s3_uri",
            Self::Docx => "s3_uri_docx",
        }
    }

    pub fn processing_request(self, s3_uri: String) -> AgentRequest {
        match self {
            Self::Mp3 | Self::Webm => AgentRequest::Media { s3_uri },
            Self::Docx => AgentRequest::Document { s3_uri_docx: s3_uri },
        }
    }
}

/// A file or recording waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    /// Local copy that can be opened for playback, if any.
    pub source: Option<PathBuf>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
            source: None,
        }
    }

    /// Read a file from disk; the MIME type is derived from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archivo".to_string());
        let mime = FileKind::from_name(&name)
            .map(|k| k.content_type())
            .unwrap_or("application/octet-stream");
        Ok(Self {
            name,
            mime: mime.to_string(),
            bytes,
            source: Some(path.to_path_buf()),
        })
    }

    /// True for `audio/mpeg` and `audio/webm`, the types that get an inline player.
    pub fn is_audio(&self) -> bool {
        self.mime == "audio/mpeg" || self.mime == "audio/webm"
    }

    /// Playback reference for the user's bubble (audio only).
    pub fn preview(&self) -> Option<String> {
        if !self.is_audio() {
            return None;
        }
        self.source.as_ref().map(|p| p.display().to_string())
    }
}

/// Step of the exchange that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RequestUrl,
    Put,
    Agent,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::RequestUrl => write!(f, "upload-url"),
            Stage::Put => write!(f, "upload"),
            Stage::Agent => write!(f, "agent"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage} step failed: {source}")]
pub struct SendFailure {
    pub stage: Stage,
    #[source]
    pub source: TranscriptionError,
}

impl SendFailure {
    fn at(stage: Stage) -> impl FnOnce(TranscriptionError) -> Self {
        move |source| Self { stage, source }
    }

    /// True once the bytes were handed to storage; the attachment is not restored after that point.
    pub fn attachment_consumed(&self) -> bool {
        self.stage == Stage::Agent
    }

    /// User-visible notice for this failure.
    pub fn notice(&self) -> &'static str {
        match self.source {
            TranscriptionError::MissingStorageUri => MISSING_STORAGE_NOTICE,
            _ => SEND_FAILED_NOTICE,
        }
    }
}

/// Run credential → PUT → `/agent` for one attachment.
///
/// The PUT status is only logged: any response that is not a transport error counts as stored.
pub async fn upload_and_process(
    backend: &dyn TranscriptionBackend,
    attachment: &Attachment,
    kind: FileKind,
) -> Result<AgentReply, SendFailure> {
    log::debug!("requesting upload url for {} ({})", attachment.name, kind.filetype());
    let target = backend
        .request_upload_url(&attachment.name, kind.filetype())
        .await
        .map_err(SendFailure::at(Stage::RequestUrl))?;
    log::info!("s3_uri received: {}", target.s3_uri);

    let status = backend
        .put_object(
            &target.presigned_url,
            kind.content_type(),
            attachment.bytes.clone(),
        )
        .await
        .map_err(SendFailure::at(Stage::Put))?;
    if !(200..300).contains(&status) {
        log::warn!(
            "storage answered {} for {}; continuing as if stored",
            status,
            attachment.name
        );
    }

    backend
        .agent(&kind.processing_request(target.s3_uri))
        .await
        .map_err(SendFailure::at(Stage::Agent))
}

/// Send free text to `/agent`.
pub async fn send_text(backend: &dyn TranscriptionBackend, text: &str) -> Result<AgentReply, SendFailure> {
    backend
        .agent(&AgentRequest::Text {
            mensaje: text.to_string(),
        })
        .await
        .map_err(SendFailure::at(Stage::Agent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_supported_extensions() {
        let cases = [
            ("clase.mp3", FileKind::Mp3, "audio/mpeg", "s3_uri"),
            ("grabacion_1.webm", FileKind::Webm, "audio/webm", "s3_uri"),
            ("Ensayo.Final.DOCX", FileKind::Docx, DOCX_MIME, "s3_uri_docx"),
        ];
        for (name, kind, mime, field) in cases {
            let k = FileKind::from_name(name).unwrap();
            assert_eq!(k, kind);
            assert_eq!(k.content_type(), mime);
            assert_eq!(k.discriminator(), field);
            let body = serde_json::to_value(k.processing_request("s3://x".into())).unwrap();
            assert!(body.get(field).is_some(), "{name} body {body}");
        }
    }

    #[test]
    fn reject_other_extensions() {
        for name in ["foto.png", "notas.doc", "audio.wav", "sin_extension", "clase.mp3.png"] {
            assert_eq!(FileKind::from_name(name), None, "{name}");
        }
    }

    #[test]
    fn bare_extension_is_its_own_kind() {
        assert_eq!(FileKind::from_name("mp3"), Some(FileKind::Mp3));
        assert_eq!(FileKind::from_name("DOCX"), Some(FileKind::Docx));
        assert_eq!(FileKind::from_name("clase."), None);
    }

    #[test]
    fn preview_only_for_audio_with_source() {
        let mut a = Attachment::new("x.mp3", "audio/mpeg", vec![1]);
        assert!(a.is_audio());
        assert_eq!(a.preview(), None);
        a.source = Some(PathBuf::from("/tmp/x.mp3"));
        assert_eq!(a.preview().as_deref(), Some("/tmp/x.mp3"));

        let mut d = Attachment::new("x.docx", DOCX_MIME, vec![1]);
        d.source = Some(PathBuf::from("/tmp/x.docx"));
        assert!(!d.is_audio());
        assert_eq!(d.preview(), None);
    }

    #[test]
    fn failure_notices() {
        let missing = SendFailure {
            stage: Stage::RequestUrl,
            source: TranscriptionError::MissingStorageUri,
        };
        assert_eq!(missing.notice(), MISSING_STORAGE_NOTICE);
        assert!(!missing.attachment_consumed());

        let agent = SendFailure {
            stage: Stage::Agent,
            source: TranscriptionError::Api("500".into()),
        };
        assert_eq!(agent.notice(), SEND_FAILED_NOTICE);
        assert!(agent.attachment_consumed());
    }
}
