use serde::Serialize;

use super::state::TransportState;
use crate::error::AsrError;
use crate::protocol::RecognitionFragment;

/// Notifications published by a connection's reader task, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Socket handshake completed
    Connected,

    /// The service acknowledged the session
    HandshakeSucceeded { session_id: String },

    /// A final or interim recognition fragment
    Fragment(RecognitionFragment),

    /// Last segment received; carries the full accumulated transcript
    Completed { transcript: String },

    /// Always dispatched before `Closed` when the session fails
    Error(AsrError),

    Closed { code: Option<u16>, reason: String },
}

impl TransportEvent {
    /// No further events follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportEvent::Closed { .. })
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: TransportState,

    /// Identifier assigned by the service; `None` until the handshake
    pub session_id: Option<String>,

    /// Final fragments received so far, in arrival order
    pub transcript: String,

    #[serde(serialize_with = "serialize_error")]
    pub last_error: Option<AsrError>,
}

fn serialize_error<S>(error: &Option<AsrError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}
