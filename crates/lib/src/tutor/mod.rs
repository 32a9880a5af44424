//! Tutor chat: identity gate, chat client, panel state.

pub mod client;
pub mod identity;
pub mod panel;

pub use client::{ChatReply, ChatRequest, ChatStatus, TutorClient, TutorError};
pub use identity::{GateState, Identity, IdentityGate, InvalidIdentity, SessionContext, Submitted};
pub use panel::{ChatJob, ImageError, PendingImage, TutorPanel};
