//! Normalization of `/agent` replies.
//!
//! The service sometimes answers with a gateway envelope whose `body` field is itself a JSON
//! document serialized as a string. Both shapes are folded into one `AgentReply` here so that
//! nothing past the client sees the nested form.

use crate::session::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of the bot message shown when a transcript is returned.
pub const TRANSCRIPT_READY_PREFIX: &str = "✅ Tu transcripción está lista: ";

/// Fallback text when the reply carries none of the known text fields.
pub const PROCESSING_TEXT: &str = "Procesando…";

/// Reply from the processing endpoint. Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReply {
    /// Transcript of an uploaded audio clip.
    pub texto: Option<String>,
    pub message: Option<String>,
    pub respuesta: Option<String>,
    /// Generated audio for text-to-speech requests.
    pub audio_url: Option<String>,
}

fn text_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(|x| x.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

impl AgentReply {
    /// Unwrap a possibly double-encoded response body.
    pub fn from_value(value: Value) -> Self {
        let inner = match value.get("body").and_then(|b| b.as_str()) {
            Some(body) => match serde_json::from_str::<Value>(body) {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::debug!("agent body is not JSON ({}), using outer document", e);
                    value
                }
            },
            None => value,
        };
        Self {
            texto: text_field(&inner, "texto"),
            message: text_field(&inner, "message"),
            respuesta: text_field(&inner, "respuesta"),
            audio_url: text_field(&inner, "audio_url"),
        }
    }

    /// Text for the bot bubble: transcript first, then message, then respuesta.
    pub fn display_text(&self) -> String {
        if let Some(ref t) = self.texto {
            return format!("{}{}", TRANSCRIPT_READY_PREFIX, t);
        }
        self.message
            .clone()
            .or_else(|| self.respuesta.clone())
            .unwrap_or_else(|| PROCESSING_TEXT.to_string())
    }

    pub fn into_message(self) -> Message {
        let text = self.display_text();
        Message::bot(text).with_audio(self.audio_url)
    }
}

/// If `text` is a transcript bubble, return the transcript alone.
pub fn transcript_body(text: &str) -> Option<&str> {
    text.strip_prefix(TRANSCRIPT_READY_PREFIX)
}
