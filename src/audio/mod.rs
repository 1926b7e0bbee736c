pub mod file;
pub mod pacer;

pub use file::AudioFile;
pub use pacer::{FrameSink, Pacer, PacingReport, DEFAULT_FRAME_BYTES, DEFAULT_FRAME_INTERVAL};
