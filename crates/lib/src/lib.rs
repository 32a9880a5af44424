//! IPETH core library: panel state machines, service clients, and local state
//! shared by the CLI and desktop applications.

pub mod config;
pub mod dashboard;
pub mod guard;
pub mod init;
pub mod session;
pub mod shell;
pub mod store;
pub mod transcription;
pub mod tutor;
