use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AsrError, AsrResult};

/// Timing and retry settings for transcription sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bytes per audio frame (1280 = 40ms of 16kHz 16-bit mono)
    pub frame_bytes: usize,

    /// Interval between paced frames in batch mode
    pub frame_interval_ms: u64,

    /// Settle time after the handshake before the first frame.
    /// The service gives no readiness signal beyond the handshake, and
    /// sending immediately loses the start of the audio.
    pub ready_grace_ms: u64,

    /// Socket connect timeout per attempt
    pub connect_timeout_ms: u64,

    /// How long to wait for the `started` acknowledgement per attempt
    pub handshake_timeout_ms: u64,

    /// Connection attempts before giving up (streaming is never retried)
    pub connect_attempts: u32,

    /// Pause between connection attempts
    pub retry_backoff_ms: u64,

    /// Extra wait beyond the audio duration for the final result in batch mode
    pub completion_margin_ms: u64,

    /// Wait for the final result after `end` in incremental mode
    pub end_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_bytes: 1280,
            frame_interval_ms: 40,
            ready_grace_ms: 1500,
            connect_timeout_ms: 20_000,
            handshake_timeout_ms: 10_000,
            connect_attempts: 3,
            retry_backoff_ms: 2000,
            completion_margin_ms: 10_000,
            end_timeout_ms: 30_000,
        }
    }
}

impl SessionConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn ready_grace(&self) -> Duration {
        Duration::from_millis(self.ready_grace_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn completion_margin(&self) -> Duration {
        Duration::from_millis(self.completion_margin_ms)
    }

    pub fn end_timeout(&self) -> Duration {
        Duration::from_millis(self.end_timeout_ms)
    }

    /// Reject settings that cannot produce a valid audio stream
    pub fn validate(&self) -> AsrResult<()> {
        if self.frame_bytes == 0 || self.frame_bytes % 2 != 0 {
            return Err(AsrError::Config(format!(
                "frame_bytes must be a positive multiple of the 2-byte sample size, got {}",
                self.frame_bytes
            )));
        }
        if self.frame_interval_ms == 0 {
            return Err(AsrError::Config("frame_interval_ms must be positive".to_string()));
        }
        if self.connect_attempts == 0 {
            return Err(AsrError::Config("connect_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}
