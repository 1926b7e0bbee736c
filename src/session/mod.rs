//! Transcription session orchestration
//!
//! This module sequences the full life cycle of a transcription request:
//! - Signing and connecting, with bounded retries before streaming starts
//! - Waiting for the handshake plus the settle interval
//! - Pacing a complete buffer (batch) or relaying caller chunks (incremental)
//! - Sending the end marker and waiting for the final result under a deadline
//! - Tracking incremental sessions by handle

mod config;
mod outcome;
mod registry;
mod transcriber;

pub use config::SessionConfig;
pub use outcome::{OutcomeStatus, OutcomeSummary, TranscriptionOutcome};
pub use registry::{SessionHandle, SessionRegistry};
pub use transcriber::Transcriber;
