use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::outcome::{OutcomeStatus, TranscriptionOutcome};
use super::registry::{SessionHandle, SessionRegistry};
use crate::audio::Pacer;
use crate::config::Config;
use crate::error::{AsrError, AsrResult};
use crate::protocol::RecognitionFragment;
use crate::signing::{BusinessParams, RequestSigner};
use crate::transport::{
    millis, CloseKind, SessionSnapshot, StreamingTransport, TransportEvent, TransportState,
};

type Connection = (StreamingTransport, mpsc::UnboundedReceiver<TransportEvent>);

/// Drives transcription sessions against the realtime ASR service
///
/// Two modes are supported:
/// - Batch: [`Transcriber::transcribe`] paces a complete buffer at real-time rate
/// - Incremental: [`Transcriber::open`], [`Transcriber::send_chunk`], [`Transcriber::end`]
///   with the caller controlling cadence
pub struct Transcriber {
    signer: RequestSigner,
    config: SessionConfig,
    pacer: Pacer,
    registry: SessionRegistry,
}

impl Transcriber {
    pub fn new(signer: RequestSigner, config: SessionConfig) -> Self {
        let pacer = Pacer::new(config.frame_bytes, config.frame_interval());

        Self {
            signer,
            config,
            pacer,
            registry: SessionRegistry::new(),
        }
    }

    /// Build from loaded configuration; fails fast on unusable credentials or timing
    pub fn from_config(config: &Config) -> AsrResult<Self> {
        config.streaming.validate()?;
        let signer = RequestSigner::new(config.asr.endpoint.clone(), config.asr.credentials())?;
        Ok(Self::new(signer, config.streaming.clone()))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Transcribe a complete audio buffer
    pub async fn transcribe(
        &self,
        audio: &[u8],
        params: &BusinessParams,
    ) -> AsrResult<TranscriptionOutcome> {
        self.transcribe_with(audio, params, |_| {}).await
    }

    /// Transcribe a complete audio buffer, reporting every fragment as it arrives
    ///
    /// Only signing and input validation fail with `Err`; network and protocol
    /// failures are reported through the outcome's status together with any
    /// partial transcript.
    pub async fn transcribe_with<F>(
        &self,
        audio: &[u8],
        params: &BusinessParams,
        on_fragment: F,
    ) -> AsrResult<TranscriptionOutcome>
    where
        F: FnMut(&RecognitionFragment) + Send + 'static,
    {
        if audio.is_empty() {
            return Err(AsrError::Audio("no audio data".to_string()));
        }

        let started = Instant::now();
        info!("Starting batch transcription: {} bytes", audio.len());

        let (transport, events) = match self.establish(params).await {
            Ok(connection) => connection,
            Err(e @ AsrError::Signing(_)) => return Err(e),
            Err(e) => return Ok(TranscriptionOutcome::failed(e, started.elapsed())),
        };
        spawn_observer(events, on_fragment);

        let status = self.stream_batch(&transport, audio).await;
        let outcome = finish(&transport, status, started).await;

        info!(
            "Batch transcription finished: status={:?}, session={:?}, {} chars",
            outcome.status,
            outcome.session_id,
            outcome.text.chars().count()
        );

        Ok(outcome)
    }

    /// Open an incremental session; audio is then pushed with [`Transcriber::send_chunk`]
    pub async fn open(&self, params: &BusinessParams) -> AsrResult<SessionHandle> {
        let (transport, events) = self.establish(params).await?;
        spawn_observer(events, |_| {});

        self.settle().await;

        let handle = self.registry.insert(transport);
        info!("Incremental session opened: {}", handle);

        Ok(handle)
    }

    /// Send caller-paced audio on an open session
    ///
    /// A session that already closed fails with `NotConnected`; its outcome
    /// is still collected by [`Transcriber::end`].
    pub async fn send_chunk(&self, handle: &SessionHandle, bytes: &[u8]) -> AsrResult<()> {
        let transport = self
            .registry
            .get(handle)
            .ok_or_else(|| AsrError::UnknownSession(handle.to_string()))?;

        transport.send_audio(bytes).await
    }

    /// Signal end of audio and wait for the final transcript
    ///
    /// If the connection already failed, the outcome carries that failure
    /// together with the transcript confirmed before it.
    pub async fn end(&self, handle: &SessionHandle) -> AsrResult<TranscriptionOutcome> {
        let transport = self
            .registry
            .remove(handle)
            .ok_or_else(|| AsrError::UnknownSession(handle.to_string()))?;

        let started = Instant::now();
        info!("Ending incremental session {}", handle);

        let status = match transport.send_end().await {
            Ok(()) => self.await_final(&transport, self.config.end_timeout()).await,
            Err(e) => terminal_status(&transport, e).await,
        };

        Ok(finish(&transport, status, started).await)
    }

    /// Force a session closed and forget it
    pub async fn cancel(&self, handle: &SessionHandle) -> AsrResult<()> {
        let transport = self
            .registry
            .remove(handle)
            .ok_or_else(|| AsrError::UnknownSession(handle.to_string()))?;

        transport.cancel().await;
        Ok(())
    }

    pub async fn status(&self, handle: &SessionHandle) -> AsrResult<SessionSnapshot> {
        let transport = self
            .registry
            .get(handle)
            .ok_or_else(|| AsrError::UnknownSession(handle.to_string()))?;

        Ok(transport.snapshot().await)
    }

    async fn stream_batch(&self, transport: &StreamingTransport, audio: &[u8]) -> OutcomeStatus {
        self.settle().await;

        if let Err(e) = self.pacer.pace(transport, audio).await {
            return terminal_status(transport, e).await;
        }

        if let Err(e) = transport.send_end().await {
            return terminal_status(transport, e).await;
        }

        let deadline = self.pacer.estimated_duration(audio.len()) + self.config.completion_margin();
        self.await_final(transport, deadline).await
    }

    async fn await_final(&self, transport: &StreamingTransport, deadline: Duration) -> OutcomeStatus {
        info!("Waiting up to {:.1}s for the final result", deadline.as_secs_f64());

        if transport.wait_closed(deadline).await {
            let fallback = AsrError::StreamAborted {
                frames_sent: transport.frames_sent(),
                reason: "connection closed without a final result".to_string(),
            };
            terminal_status(transport, fallback).await
        } else {
            warn!("Timed out waiting for the final result, returning partial transcript");
            OutcomeStatus::TimedOut
        }
    }

    /// Connect and wait for the handshake, retrying failed attempts
    async fn establish(&self, params: &BusinessParams) -> AsrResult<Connection> {
        let attempts = self.config.connect_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            // Fresh timestamp and nonce for every attempt
            let url = self.signer.signed_url(params)?;
            info!("Connecting to ASR service (attempt {}/{})", attempt, attempts);

            match self.connect_once(&url).await {
                Ok(connection) => {
                    info!("Connected on attempt {}", attempt);
                    return Ok(connection);
                }
                Err(e @ AsrError::Protocol { .. }) => return Err(e),
                Err(e) => {
                    warn!("Connection attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_backoff()).await;
                    }
                }
            }
        }

        Err(AsrError::Connect(format!(
            "gave up after {} attempts: {}",
            attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn connect_once(&self, url: &str) -> AsrResult<Connection> {
        let (transport, events) =
            StreamingTransport::connect(url, self.config.connect_timeout()).await?;
        transport.wait_ready(self.config.handshake_timeout()).await?;
        Ok((transport, events))
    }

    async fn settle(&self) {
        let grace = self.config.ready_grace();
        if !grace.is_zero() {
            debug!("Waiting {}ms for the service to settle", millis(grace));
            tokio::time::sleep(grace).await;
        }
    }
}

/// Status of a session that reached (or was forced into) a terminal state
async fn terminal_status(transport: &StreamingTransport, fallback: AsrError) -> OutcomeStatus {
    match transport.state() {
        TransportState::Closed(CloseKind::Success) => OutcomeStatus::Completed,
        _ => OutcomeStatus::Failed(transport.last_error().await.unwrap_or(fallback)),
    }
}

/// Collect the outcome and make sure the connection does not outlive the request
async fn finish(
    transport: &StreamingTransport,
    status: OutcomeStatus,
    started: Instant,
) -> TranscriptionOutcome {
    let snapshot = transport.snapshot().await;
    if !snapshot.state.is_closed() {
        transport.cancel().await;
    }

    TranscriptionOutcome {
        session_id: snapshot.session_id,
        text: snapshot.transcript,
        status,
        frames_sent: transport.frames_sent(),
        elapsed: started.elapsed(),
    }
}

fn spawn_observer<F>(mut events: mpsc::UnboundedReceiver<TransportEvent>, mut on_fragment: F)
where
    F: FnMut(&RecognitionFragment) + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match &event {
                TransportEvent::Fragment(fragment) => on_fragment(fragment),
                TransportEvent::Error(e) => warn!("Session error: {}", e),
                other => debug!("Transport event: {:?}", other),
            }
            if event.is_terminal() {
                break;
            }
        }
    });
}
