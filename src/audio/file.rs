use hound::{SampleFormat, WavReader};
use std::path::Path;
use tracing::info;

use crate::error::{AsrError, AsrResult};

/// Audio loaded from disk as 16-bit little-endian PCM bytes
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub pcm: Vec<u8>,
}

impl AudioFile {
    /// Open a `.wav` file, or read any other file as raw PCM in the given format
    pub fn open(path: impl AsRef<Path>, raw_sample_rate: u32) -> AsrResult<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));

        let audio = if is_wav {
            Self::open_wav(path)?
        } else {
            let pcm = std::fs::read(path)
                .map_err(|e| AsrError::Audio(format!("failed to read {}: {}", path.display(), e)))?;
            Self::from_pcm(path.display().to_string(), pcm, raw_sample_rate, 1)
        };

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} bytes",
            audio.duration_seconds,
            audio.sample_rate,
            audio.channels,
            audio.pcm.len()
        );

        Ok(audio)
    }

    fn open_wav(path: &Path) -> AsrResult<Self> {
        let reader = WavReader::open(path)
            .map_err(|e| AsrError::Audio(format!("failed to open WAV file: {}", e)))?;

        let spec = reader.spec();
        if spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
            return Err(AsrError::Audio(format!(
                "expected 16-bit integer PCM, got {}-bit {:?}",
                spec.bits_per_sample, spec.sample_format
            )));
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AsrError::Audio(format!("failed to read audio samples: {}", e)))?;

        let pcm = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        Ok(Self::from_pcm(
            path.display().to_string(),
            pcm,
            spec.sample_rate,
            spec.channels,
        ))
    }

    fn from_pcm(path: String, pcm: Vec<u8>, sample_rate: u32, channels: u16) -> Self {
        let bytes_per_second = f64::from(sample_rate) * f64::from(channels) * 2.0;
        let duration_seconds = if bytes_per_second > 0.0 {
            pcm.len() as f64 / bytes_per_second
        } else {
            0.0
        };

        Self {
            path,
            duration_seconds,
            sample_rate,
            channels,
            pcm,
        }
    }

    /// Reject audio that does not match the format declared to the service
    pub fn ensure_format(&self, sample_rate: u32, channels: u16) -> AsrResult<()> {
        if self.sample_rate != sample_rate || self.channels != channels {
            return Err(AsrError::Audio(format!(
                "expected {}Hz {}ch, got {}Hz {}ch",
                sample_rate, channels, self.sample_rate, self.channels
            )));
        }
        Ok(())
    }
}
