pub mod audio;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod signing;
pub mod transport;

pub use audio::{AudioFile, FrameSink, Pacer, PacingReport};
pub use config::Config;
pub use error::{AsrError, AsrResult};
pub use protocol::{InboundEvent, RecognitionFragment};
pub use session::{
    OutcomeStatus, OutcomeSummary, SessionConfig, SessionHandle, SessionRegistry, Transcriber,
    TranscriptionOutcome,
};
pub use signing::{BusinessParams, Credentials, RequestSigner};
pub use transport::{CloseKind, SessionSnapshot, StreamingTransport, TransportEvent, TransportState};
