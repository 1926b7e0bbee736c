use serde::Serialize;
use std::time::Duration;

use crate::error::AsrError;

/// How a transcription request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// The service delivered its last segment
    Completed,

    /// No terminal state before the deadline; `text` is partial
    TimedOut,

    /// The session failed; `text` holds whatever was confirmed before
    Failed(AsrError),
}

/// Result of one transcription session
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    /// Identifier assigned by the service, if the handshake completed
    pub session_id: Option<String>,

    /// Final fragments in arrival order
    pub text: String,

    pub status: OutcomeStatus,

    /// Audio frames delivered to the service
    pub frames_sent: usize,

    pub elapsed: Duration,
}

impl TranscriptionOutcome {
    pub(crate) fn failed(error: AsrError, elapsed: Duration) -> Self {
        Self {
            session_id: None,
            text: String::new(),
            status: OutcomeStatus::Failed(error),
            frames_sent: 0,
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }

    pub fn is_timeout(&self) -> bool {
        self.status == OutcomeStatus::TimedOut
    }

    pub fn error(&self) -> Option<&AsrError> {
        match &self.status {
            OutcomeStatus::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn summary(&self) -> OutcomeSummary {
        let (status, message) = match &self.status {
            OutcomeStatus::Completed => ("success", None),
            OutcomeStatus::TimedOut => ("timeout", Some("final result not received in time".to_string())),
            OutcomeStatus::Failed(e) => ("error", Some(e.to_string())),
        };

        OutcomeSummary {
            session_id: self.session_id.clone(),
            transcription_text: self.text.clone(),
            status,
            message,
            frames_sent: self.frames_sent,
            elapsed_secs: self.elapsed.as_secs_f64(),
        }
    }
}

/// Serializable view of an outcome for callers that report it as JSON
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSummary {
    pub session_id: Option<String>,
    pub transcription_text: String,
    pub status: &'static str,
    pub message: Option<String>,
    pub frames_sent: usize,
    pub elapsed_secs: f64,
}
