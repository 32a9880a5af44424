//! Transcription panel state: message log, text input, pending attachment, recorder.
//!
//! Sending is split in two so any front-end can run the network part off its UI thread:
//! `begin_send` validates and returns a `SendJob`; the caller runs `SendJob::run` and hands
//! the result to `complete`.

use super::capture::{CaptureError, Recorder, MIC_UNAVAILABLE_NOTICE};
use super::client::TranscriptionBackend;
use super::envelope::AgentReply;
use super::upload::{self, Attachment, FileKind, SendFailure, UNSUPPORTED_FILE_NOTICE};
use crate::guard::{RequestGuard, Ticket};
use crate::session::{Message, MessageLog};

/// Greeting shown while the log is empty.
pub const GREETING: &str = "👋 Hola, soy tu asistente!\nPuedo convertir textos en audio y audios en texto.\nSube un archivo .docx, un .mp3 o presiona el micrófono para comenzar una grabación.";

/// Input rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("{}", UNSUPPORTED_FILE_NOTICE)]
    UnsupportedFile { name: String },
}

/// What a send will do once run.
#[derive(Debug, Clone)]
pub enum SendPayload {
    Upload { attachment: Attachment, kind: FileKind },
    Text(String),
}

/// A validated send, ready to run against a backend.
#[derive(Debug, Clone)]
pub struct SendJob {
    pub ticket: Ticket,
    pub payload: SendPayload,
}

/// Result of a job, returned to `TranscriptionPanel::complete`.
#[derive(Debug)]
pub struct SendOutcome {
    pub ticket: Ticket,
    /// The attachment that was sent, handed back so it can be restored on early failure.
    pub attachment: Option<Attachment>,
    pub result: Result<AgentReply, SendFailure>,
}

impl SendJob {
    pub async fn run(self, backend: &dyn TranscriptionBackend) -> SendOutcome {
        match self.payload {
            SendPayload::Upload { attachment, kind } => {
                let result = upload::upload_and_process(backend, &attachment, kind).await;
                SendOutcome {
                    ticket: self.ticket,
                    attachment: Some(attachment),
                    result,
                }
            }
            SendPayload::Text(text) => SendOutcome {
                ticket: self.ticket,
                attachment: None,
                result: upload::send_text(backend, &text).await,
            },
        }
    }
}

pub struct TranscriptionPanel {
    log: MessageLog,
    pub input: String,
    attachment: Option<Attachment>,
    recorder: Recorder,
    guard: RequestGuard,
    notice: Option<String>,
}

impl TranscriptionPanel {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            log: MessageLog::new(),
            input: String::new(),
            attachment: None,
            recorder,
            guard: RequestGuard::new(),
            notice: None,
        }
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Pending blocking notice (rejection or failure), cleared when taken.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Replace the pending attachment. Ignored while a send is outstanding.
    pub fn select_attachment(&mut self, attachment: Attachment) -> bool {
        if self.is_busy() {
            return false;
        }
        if let Some(old) = self.attachment.replace(attachment) {
            log::debug!("discarding previously selected attachment {}", old.name);
        }
        true
    }

    pub fn cancel_attachment(&mut self) {
        self.attachment = None;
    }

    /// Microphone toggle. A finished clip becomes the pending attachment.
    pub fn toggle_recording(&mut self) -> Result<(), CaptureError> {
        if self.is_busy() {
            return Ok(());
        }
        match self.recorder.toggle() {
            Ok(Some(clip)) => {
                self.attachment = Some(clip);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                log::error!("microphone capture failed: {}", e);
                self.notice = Some(MIC_UNAVAILABLE_NOTICE.to_string());
                Err(e)
            }
        }
    }

    /// Validate the current input and claim the request slot.
    ///
    /// Returns `Ok(None)` when there is nothing to send or a send is already outstanding.
    /// The attachment, when present, drives the send; typed text is then discarded.
    pub fn begin_send(&mut self) -> Result<Option<SendJob>, Rejection> {
        if self.is_busy() {
            return Ok(None);
        }
        let text = self.input.trim().to_string();
        if text.is_empty() && self.attachment.is_none() {
            return Ok(None);
        }

        if let Some(attachment) = self.attachment.take() {
            let Some(kind) = FileKind::from_name(&attachment.name) else {
                let rejection = Rejection::UnsupportedFile {
                    name: attachment.name.clone(),
                };
                self.attachment = Some(attachment);
                self.notice = Some(rejection.to_string());
                return Err(rejection);
            };
            let Some(ticket) = self.guard.begin() else {
                self.attachment = Some(attachment);
                return Ok(None);
            };
            self.log
                .push(Message::user(attachment.name.clone()).with_audio(attachment.preview()));
            self.input.clear();
            return Ok(Some(SendJob {
                ticket,
                payload: SendPayload::Upload { attachment, kind },
            }));
        }

        let Some(ticket) = self.guard.begin() else {
            return Ok(None);
        };
        self.log.push(Message::user(text.clone()));
        self.input.clear();
        Ok(Some(SendJob {
            ticket,
            payload: SendPayload::Text(text),
        }))
    }

    /// Apply a finished job. Returns false when the outcome was stale and dropped.
    pub fn complete(&mut self, outcome: SendOutcome) -> bool {
        if !self.guard.finish(outcome.ticket) {
            log::debug!("dropping stale transcription result");
            return false;
        }
        match outcome.result {
            Ok(reply) => {
                self.log.push(reply.into_message());
            }
            Err(failure) => {
                log::error!("error sending message: {}", failure);
                if !failure.attachment_consumed() && self.attachment.is_none() {
                    self.attachment = outcome.attachment;
                }
                self.notice = Some(failure.notice().to_string());
            }
        }
        true
    }

    /// Forget any outstanding send (e.g. the panel is being torn down or reset).
    pub fn abandon_in_flight(&mut self) {
        self.guard.invalidate();
    }
}
