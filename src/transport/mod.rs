//! Streaming connection to the realtime ASR service
//!
//! This module owns the live WebSocket:
//! - Outbound binary audio frames and the end-of-stream control message
//! - A reader task per connection that decodes inbound messages
//! - The connection state machine and its wait primitives

mod connection;
mod events;
mod state;

pub use connection::StreamingTransport;
pub(crate) use connection::millis;
pub use events::{SessionSnapshot, TransportEvent};
pub use state::{CloseKind, TransportState};
