//! Chat log shared by the transcription and tutor panels.
//!
//! A log is an insertion-ordered list of messages. Messages are never edited or removed
//! individually; the only destructive operation is clearing the whole log.

use serde::{Deserialize, Serialize};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// A single message in a panel's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    /// Playable audio: a remote URL for bot replies, a local file path for user uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    /// Inline image preview (data URL) attached by the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_preview: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            audio_url: None,
            image_preview: None,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            audio_url: None,
            image_preview: None,
        }
    }

    pub fn with_audio(mut self, audio_url: Option<String>) -> Self {
        self.audio_url = audio_url;
        self
    }

    pub fn with_image_preview(mut self, preview: Option<String>) -> Self {
        self.image_preview = preview;
        self
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}

/// Ordered message history for one mounted panel.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keeps_insertion_order() {
        let mut log = MessageLog::new();
        log.push(Message::user("hola"));
        log.push(Message::bot("respuesta"));
        let texts: Vec<&str> = log.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hola", "respuesta"]);
        assert!(log.as_slice()[0].is_user());
        assert!(!log.as_slice()[1].is_user());
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = MessageLog::new();
        log.push(Message::user("a"));
        log.clear();
        assert!(log.is_empty());
        assert!(log.last().is_none());
    }

    #[test]
    fn optional_fields_are_skipped_when_absent() {
        let json = serde_json::to_value(Message::bot("x")).unwrap();
        assert_eq!(json, serde_json::json!({"sender": "bot", "text": "x"}));
    }
}
