use thiserror::Error;

use crate::transport::TransportState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsrError {
    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Connect error: {0}")]
    Connect(String),

    /// The remote service answered with an `error` envelope.
    #[error("Protocol error {code}: {description}")]
    Protocol { code: String, description: String },

    #[error("Timed out after {waited_ms}ms waiting for {stage}")]
    Timeout { stage: &'static str, waited_ms: u64 },

    /// The connection went away while audio was still being sent.
    #[error("Stream aborted after {frames_sent} frames: {reason}")]
    StreamAborted { frames_sent: usize, reason: String },

    #[error("Not connected (state: {state})")]
    NotConnected { state: TransportState },

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Session cancelled")]
    Cancelled,
}

pub type AsrResult<T> = Result<T, AsrError>;
