use serde::Serialize;
use std::fmt;

/// How a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseKind {
    Success,
    Error,
}

/// Lifecycle of one streaming connection
///
/// `Idle → Connecting → Connected → Handshaking → Ready → Streaming → Ending → Closed`,
/// with any state able to jump to `Closed(Error)`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Idle,
    Connecting,
    Connected,
    Handshaking,
    Ready,
    Streaming,
    Ending,
    Closed(CloseKind),
}

impl TransportState {
    /// Audio and control messages may only be sent in these states
    pub fn can_send(&self) -> bool {
        matches!(self, TransportState::Ready | TransportState::Streaming)
    }

    /// Handshake observed (the session has an identifier)
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            TransportState::Ready | TransportState::Streaming | TransportState::Ending
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, TransportState::Closed(_))
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Idle => "idle",
            TransportState::Connecting => "connecting",
            TransportState::Connected => "connected",
            TransportState::Handshaking => "handshaking",
            TransportState::Ready => "ready",
            TransportState::Streaming => "streaming",
            TransportState::Ending => "ending",
            TransportState::Closed(CloseKind::Success) => "closed(success)",
            TransportState::Closed(CloseKind::Error) => "closed(error)",
        };
        f.write_str(name)
    }
}
