//! Wire format of the realtime ASR service
//!
//! Inbound messages are JSON envelopes whose recognition text is nested as
//! segment → sentence → word groups → word candidates. The decoder flattens
//! that shape into a single `InboundEvent`.

pub mod decoder;
pub mod messages;

pub use decoder::{decode, InboundEvent, RecognitionFragment};
pub use messages::{EndOfStream, ResponseEnvelope};
