//! Tutor panel state: chat log, pending image, identity gate.

use super::client::{ChatReply, ChatRequest, ChatStatus, TutorError};
use super::identity::{IdentityGate, InvalidIdentity, SessionContext};
use crate::guard::{RequestGuard, Ticket};
use crate::session::{Message, MessageLog};
use base64::Engine;
use std::path::Path;

pub const GREETING: &str = "👋 Hola, escribe cualquier mensaje para comenzar.";
pub const IMAGE_ONLY_TEXT: &str = "📷 Imagen adjunta";
pub const INVALID_ID_REPLY: &str = "❌ La matrícula que ingresaste no existe. Intenta de nuevo.";
pub const WAITING_FOR_ID_REPLY: &str = "👋 Por favor ingresa tu matrícula para comenzar.";
pub const BAD_RESPONSE_REPLY: &str = "❌ Error en la respuesta";
pub const SERVICE_ERROR_REPLY: &str = "❌ Error al contactar el servicio";

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("not an image file: {0}")]
    NotAnImage(String),
    #[error("reading image: {0}")]
    Io(#[from] std::io::Error),
}

/// Image waiting to be sent, inlined as base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    pub mime: String,
    /// Base64 without the data-URL header (what the service expects).
    pub base64: String,
    /// Original bytes, kept for local rendering.
    pub bytes: Vec<u8>,
}

impl PendingImage {
    pub fn from_bytes(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        let base64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Self {
            mime: mime.into(),
            base64,
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ImageError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let mime = match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "bmp" => "image/bmp",
            _ => return Err(ImageError::NotAnImage(path.display().to_string())),
        };
        Ok(Self::from_bytes(mime, std::fs::read(path)?))
    }

    /// `data:<mime>;base64,<payload>`, used as the message preview.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64)
    }
}

/// Decode a data-URL preview back into bytes (for rendering a sent image).
pub fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let (_, payload) = url.strip_prefix("data:")?.split_once(";base64,")?;
    base64::engine::general_purpose::STANDARD.decode(payload).ok()
}

/// A validated chat call.
#[derive(Debug, Clone)]
pub struct ChatJob {
    pub ticket: Ticket,
    pub request: ChatRequest,
}

pub struct TutorPanel {
    log: MessageLog,
    pub input: String,
    image: Option<PendingImage>,
    gate: IdentityGate,
    guard: RequestGuard,
}

impl TutorPanel {
    /// Mount: restore the identity from `context` and show the greeting.
    pub fn new(context: SessionContext, forget_rejected_identity: bool) -> Self {
        let mut panel = Self {
            log: MessageLog::new(),
            input: String::new(),
            image: None,
            gate: IdentityGate::new(context).forget_rejected(forget_rejected_identity),
            guard: RequestGuard::new(),
        };
        panel.reset_chat();
        panel
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn gate(&self) -> &IdentityGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut IdentityGate {
        &mut self.gate
    }

    pub fn image(&self) -> Option<&PendingImage> {
        self.image.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    /// Input affordances are enabled only when identified, prompt closed, and idle.
    pub fn input_enabled(&self) -> bool {
        self.gate.can_send() && !self.is_busy()
    }

    pub fn attach_image(&mut self, image: PendingImage) -> bool {
        if !self.input_enabled() {
            return false;
        }
        self.image = Some(image);
        true
    }

    pub fn clear_image(&mut self) {
        self.image = None;
    }

    /// Back to the greeting; anything in flight is ignored when it lands.
    pub fn reset_chat(&mut self) {
        self.log.clear();
        self.log.push(Message::bot(GREETING));
        self.input.clear();
        self.image = None;
        self.guard.invalidate();
    }

    /// Forget the outstanding chat call, if any.
    pub fn abandon_in_flight(&mut self) {
        self.guard.invalidate();
    }

    /// Submit the identity prompt; a different identity restarts the chat.
    pub fn submit_identity(&mut self) -> Result<(), InvalidIdentity> {
        let submitted = self.gate.submit()?;
        if submitted.changed {
            self.reset_chat();
        }
        Ok(())
    }

    /// Validate and claim the slot. Opens the prompt instead when no identity is usable.
    pub fn begin_send(&mut self) -> Option<ChatJob> {
        if !self.gate.can_send() {
            self.gate.open_prompt();
            return None;
        }
        let text = self.input.trim().to_string();
        if (text.is_empty() && self.image.is_none()) || self.is_busy() {
            return None;
        }
        let user_id = self.gate.identity()?.as_str().to_string();
        let ticket = self.guard.begin()?;

        let image = self.image.take();
        let shown = if !text.is_empty() {
            text.clone()
        } else {
            IMAGE_ONLY_TEXT.to_string()
        };
        self.log
            .push(Message::user(shown).with_image_preview(image.as_ref().map(|i| i.data_url())));
        self.input.clear();

        Some(ChatJob {
            ticket,
            request: ChatRequest {
                user_id,
                message: text,
                image: image.map(|i| i.base64),
            },
        })
    }

    /// Apply a finished chat call. Every accepted completion appends exactly one bot message,
    /// except a server identity replacement, which restarts the chat.
    pub fn complete(&mut self, ticket: Ticket, result: Result<ChatReply, TutorError>) -> bool {
        if !self.guard.finish(ticket) {
            log::debug!("dropping stale tutor reply");
            return false;
        }
        match result {
            Ok(reply) => match reply.status {
                ChatStatus::Success => {
                    self.log
                        .push(Message::bot(reply.message.unwrap_or_default()));
                    if let Some(ref issued) = reply.user_id {
                        if self.gate.replace(issued) {
                            self.reset_chat();
                        }
                    }
                }
                ChatStatus::Invalid => {
                    self.log.push(Message::bot(INVALID_ID_REPLY));
                    self.gate.reject();
                }
                ChatStatus::WaitingForId => {
                    self.log.push(Message::bot(WAITING_FOR_ID_REPLY));
                    self.gate.open_prompt();
                }
                ChatStatus::Unknown => {
                    log::warn!("unexpected tutor status");
                    self.log.push(Message::bot(BAD_RESPONSE_REPLY));
                }
            },
            Err(e) => {
                log::error!("tutor chat failed: {}", e);
                self.log.push(Message::bot(SERVICE_ERROR_REPLY));
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use crate::tutor::identity::IDENTITY_KEY;
    use std::sync::Arc;

    fn panel_with(id: Option<&str>) -> (TutorPanel, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        if let Some(id) = id {
            store.set(IDENTITY_KEY, id).unwrap();
        }
        (TutorPanel::new(SessionContext::new(store.clone()), false), store)
    }

    fn success(msg: &str) -> Result<ChatReply, TutorError> {
        Ok(ChatReply {
            status: ChatStatus::Success,
            message: Some(msg.into()),
            user_id: None,
        })
    }

    #[test]
    fn mount_shows_greeting() {
        let (p, _) = panel_with(Some("UNIV011"));
        assert_eq!(p.log().len(), 1);
        assert_eq!(p.log().last().unwrap().text, GREETING);
    }

    #[test]
    fn unidentified_never_sends() {
        let (mut p, _) = panel_with(None);
        p.input = "hola".into();
        assert!(p.begin_send().is_none());
        assert!(p.gate().is_prompt_open());
        assert!(!p.input_enabled());
        assert_eq!(p.log().len(), 1);
    }

    #[test]
    fn submitted_identity_goes_into_requests() {
        let (mut p, store) = panel_with(None);
        p.gate_mut().draft = "UNIV011".into();
        p.submit_identity().unwrap();
        assert!(!p.gate().is_prompt_open());
        assert_eq!(store.get(IDENTITY_KEY).unwrap().as_deref(), Some("UNIV011"));

        p.input = "¿qué es una derivada?".into();
        let job = p.begin_send().unwrap();
        assert_eq!(job.request.user_id, "UNIV011");
        assert_eq!(job.request.message, "¿qué es una derivada?");
        assert_eq!(job.request.image, None);
    }

    #[test]
    fn success_appends_exactly_one_reply() {
        let (mut p, _) = panel_with(Some("UNIV011"));
        p.input = "hola".into();
        let job = p.begin_send().unwrap();
        assert!(p.is_busy());
        let before = p.log().len();
        assert!(p.complete(job.ticket, success("¡Hola!")));
        assert_eq!(p.log().len(), before + 1);
        assert_eq!(p.log().last().unwrap().text, "¡Hola!");
        assert!(!p.is_busy());
    }

    #[test]
    fn image_only_send() {
        let (mut p, _) = panel_with(Some("UNIV011"));
        p.attach_image(PendingImage::from_bytes("image/png", vec![137, 80, 78, 71]));
        let job = p.begin_send().unwrap();
        assert_eq!(job.request.message, "");
        assert_eq!(job.request.image.as_deref(), Some("iVBORw=="));
        let shown = p.log().last().unwrap();
        assert_eq!(shown.text, IMAGE_ONLY_TEXT);
        assert_eq!(shown.image_preview.as_deref(), Some("data:image/png;base64,iVBORw=="));
        assert!(p.image().is_none());
    }

    #[test]
    fn text_and_image_together() {
        let (mut p, _) = panel_with(Some("UNIV011"));
        p.input = "mira".into();
        p.attach_image(PendingImage::from_bytes("image/jpeg", vec![1, 2, 3]));
        let job = p.begin_send().unwrap();
        assert_eq!(job.request.message, "mira");
        assert!(job.request.image.is_some());
    }

    #[test]
    fn invalid_status_reverts_to_unidentified() {
        let (mut p, store) = panel_with(Some("UNIV999"));
        p.input = "hola".into();
        let job = p.begin_send().unwrap();
        p.complete(
            job.ticket,
            Ok(ChatReply {
                status: ChatStatus::Invalid,
                message: None,
                user_id: None,
            }),
        );
        assert_eq!(p.log().last().unwrap().text, INVALID_ID_REPLY);
        assert!(p.gate().identity().is_none());
        assert!(p.gate().is_prompt_open());
        assert_eq!(store.get(IDENTITY_KEY).unwrap().as_deref(), Some("UNIV999"));
        p.input = "otra vez".into();
        assert!(p.begin_send().is_none());
    }

    #[test]
    fn waiting_for_id_opens_prompt() {
        let (mut p, _) = panel_with(Some("UNIV011"));
        p.input = "hola".into();
        let job = p.begin_send().unwrap();
        p.complete(
            job.ticket,
            Ok(ChatReply {
                status: ChatStatus::WaitingForId,
                message: None,
                user_id: None,
            }),
        );
        assert_eq!(p.log().last().unwrap().text, WAITING_FOR_ID_REPLY);
        assert!(p.gate().is_prompt_open());
        assert!(!p.gate().can_send());
    }

    #[test]
    fn server_replacement_overwrites_and_resets() {
        let (mut p, store) = panel_with(Some("univ011"));
        p.input = "hola".into();
        let job = p.begin_send().unwrap();
        p.complete(
            job.ticket,
            Ok(ChatReply {
                status: ChatStatus::Success,
                message: Some("ok".into()),
                user_id: Some("UNIV011".into()),
            }),
        );
        assert_eq!(store.get(IDENTITY_KEY).unwrap().as_deref(), Some("UNIV011"));
        assert_eq!(p.log().len(), 1);
        assert_eq!(p.log().last().unwrap().text, GREETING);
    }

    #[test]
    fn same_user_id_in_reply_keeps_history() {
        let (mut p, _) = panel_with(Some("UNIV011"));
        p.input = "hola".into();
        let job = p.begin_send().unwrap();
        p.complete(
            job.ticket,
            Ok(ChatReply {
                status: ChatStatus::Success,
                message: Some("ok".into()),
                user_id: Some("UNIV011".into()),
            }),
        );
        assert_eq!(p.log().len(), 3);
    }

    #[test]
    fn unknown_status_and_transport_error() {
        let (mut p, _) = panel_with(Some("UNIV011"));
        p.input = "a".into();
        let job = p.begin_send().unwrap();
        p.complete(
            job.ticket,
            Ok(ChatReply {
                status: ChatStatus::Unknown,
                message: None,
                user_id: None,
            }),
        );
        assert_eq!(p.log().last().unwrap().text, BAD_RESPONSE_REPLY);

        p.input = "b".into();
        let job = p.begin_send().unwrap();
        p.complete(job.ticket, Err(TutorError::Api("500".into())));
        assert_eq!(p.log().last().unwrap().text, SERVICE_ERROR_REPLY);
    }

    #[test]
    fn changing_identity_drops_in_flight_reply() {
        let (mut p, _) = panel_with(Some("UNIV011"));
        p.input = "hola".into();
        let job = p.begin_send().unwrap();
        p.gate_mut().open_change();
        p.gate_mut().draft = "UNIV012".into();
        p.submit_identity().unwrap();
        assert!(!p.complete(job.ticket, success("tarde")));
        assert_eq!(p.log().len(), 1);
    }

    #[test]
    fn second_send_blocked_while_busy() {
        let (mut p, _) = panel_with(Some("UNIV011"));
        p.input = "uno".into();
        let _job = p.begin_send().unwrap();
        p.input = "dos".into();
        assert!(p.begin_send().is_none());
        assert!(!p.attach_image(PendingImage::from_bytes("image/png", vec![1])));
    }

    #[test]
    fn data_url_roundtrip_for_preview() {
        let img = PendingImage::from_bytes("image/gif", b"GIF89a".to_vec());
        assert_eq!(decode_data_url(&img.data_url()), Some(b"GIF89a".to_vec()));
        assert_eq!(decode_data_url("https://example.com/x.png"), None);
    }

    #[test]
    fn non_image_path_is_rejected() {
        let err = PendingImage::from_path(Path::new("/tmp/notas.txt")).unwrap_err();
        assert!(matches!(err, ImageError::NotAnImage(_)));
    }
}
