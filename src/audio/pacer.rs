//! Real-time pacing of pre-recorded audio
//!
//! The ASR service expects audio at the rate it would arrive from a live
//! microphone. Frames are released on an absolute schedule (start + i * interval)
//! so sleep overhead never accumulates into drift.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{AsrError, AsrResult};

/// 40ms of 16kHz 16-bit mono PCM
pub const DEFAULT_FRAME_BYTES: usize = 1280;
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(40);

/// Destination for paced audio frames
///
/// Implementations:
/// - `StreamingTransport`: binary WebSocket frames
/// - Test doubles recording send times
#[async_trait::async_trait]
pub trait FrameSink: Send + Sync {
    /// Send one frame as a single message
    async fn send_frame(&self, frame: &[u8]) -> AsrResult<()>;

    /// Whether the sink can still accept frames
    fn is_open(&self) -> bool;
}

/// Summary of a completed pacing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingReport {
    pub frames_sent: usize,
    pub bytes_sent: usize,
    pub elapsed: Duration,
}

/// Releases fixed-size frames at a fixed wall-clock cadence
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    frame_bytes: usize,
    interval: Duration,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_BYTES, DEFAULT_FRAME_INTERVAL)
    }
}

impl Pacer {
    pub fn new(frame_bytes: usize, interval: Duration) -> Self {
        Self {
            frame_bytes: frame_bytes.max(1),
            interval,
        }
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of frames needed for `len` bytes (the last one may be short)
    pub fn frame_count(&self, len: usize) -> usize {
        len.div_ceil(self.frame_bytes)
    }

    /// Wall time the schedule spans for `len` bytes
    pub fn estimated_duration(&self, len: usize) -> Duration {
        let frames = u32::try_from(self.frame_count(len)).unwrap_or(u32::MAX);
        self.interval.saturating_mul(frames)
    }

    /// Send `audio` to `sink` frame by frame at real-time rate.
    ///
    /// Aborts with `StreamAborted` as soon as the sink reports it is closed;
    /// frames already sent are not retransmitted.
    pub async fn pace<S>(&self, sink: &S, audio: &[u8]) -> AsrResult<PacingReport>
    where
        S: FrameSink + ?Sized,
    {
        let total_frames = self.frame_count(audio.len());
        info!(
            "Pacing {} bytes as {} frames every {}ms (~{:.1}s)",
            audio.len(),
            total_frames,
            self.interval.as_millis(),
            self.estimated_duration(audio.len()).as_secs_f64()
        );

        let start = Instant::now();
        let mut bytes_sent = 0;

        for (index, frame) in audio.chunks(self.frame_bytes).enumerate() {
            let offset = self
                .interval
                .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
            let target = start + offset;
            tokio::time::sleep_until(target).await;

            if !sink.is_open() {
                return Err(AsrError::StreamAborted {
                    frames_sent: index,
                    reason: "connection closed while sending audio".to_string(),
                });
            }

            sink.send_frame(frame).await.map_err(|e| match e {
                AsrError::StreamAborted { .. } => e,
                other => AsrError::StreamAborted {
                    frames_sent: index,
                    reason: other.to_string(),
                },
            })?;
            bytes_sent += frame.len();

            if index % 25 == 0 {
                let drift = Instant::now().saturating_duration_since(target);
                debug!("Frame {} sent, drift {}ms", index, drift.as_millis());
            }
        }

        let report = PacingReport {
            frames_sent: total_frames,
            bytes_sent,
            elapsed: start.elapsed(),
        };
        info!(
            "All {} frames sent in {:.2}s",
            report.frames_sent,
            report.elapsed.as_secs_f64()
        );

        Ok(report)
    }
}
