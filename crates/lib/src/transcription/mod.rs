//! Audio/text conversion assistant: service client, upload orchestration, capture, panel state.

pub mod capture;
pub mod client;
pub mod envelope;
pub mod panel;
pub mod upload;

pub use capture::{AudioSource, CaptureError, CommandSource, Recorder};
pub use client::{AgentRequest, TranscriptionBackend, TranscriptionClient, TranscriptionError, UploadTarget};
pub use envelope::AgentReply;
pub use panel::{Rejection, SendJob, SendOutcome, SendPayload, TranscriptionPanel};
pub use upload::{Attachment, FileKind, SendFailure, Stage};
