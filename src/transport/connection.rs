use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream, StreamExt};
use futures::SinkExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::events::{SessionSnapshot, TransportEvent};
use super::state::{CloseKind, TransportState};
use crate::audio::FrameSink;
use crate::error::{AsrError, AsrResult};
use crate::protocol::{decode, EndOfStream, InboundEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Session data, mutated only by inbound message handling
#[derive(Debug, Default)]
struct SessionRecord {
    session_id: Option<String>,
    transcript: String,
    last_error: Option<AsrError>,
}

/// State shared between the caller-facing handle and the reader task
struct Shared {
    state: watch::Sender<TransportState>,
    session: Mutex<SessionRecord>,
    sink: Mutex<SplitSink<WsStream, Message>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    frames_sent: AtomicUsize,
    close_notified: AtomicBool,
}

impl Shared {
    fn current(&self) -> TransportState {
        *self.state.borrow()
    }

    /// Move `from → to`; no-op when the current state is anything else
    fn advance(&self, from: TransportState, to: TransportState) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if changed {
            debug!("Transport state {} -> {}", from, to);
        }
        changed
    }

    /// Enter `Closed(kind)` unless already closed
    fn close_state(&self, kind: CloseKind) -> bool {
        let mut previous = None;
        let changed = self.state.send_if_modified(|state| {
            if state.is_closed() {
                return false;
            }
            previous = Some(*state);
            *state = TransportState::Closed(kind);
            true
        });
        if let Some(previous) = previous {
            debug!("Transport state {} -> {}", previous, TransportState::Closed(kind));
        }
        changed
    }

    fn emit(&self, event: TransportEvent) {
        // A dropped receiver just means nobody is observing
        let _ = self.events.send(event);
    }

    fn notify_closed(&self, code: Option<u16>, reason: String) {
        if !self.close_notified.swap(true, Ordering::SeqCst) {
            info!("Connection closed (code: {:?}, reason: {})", code, reason);
            self.emit(TransportEvent::Closed { code, reason });
        }
    }

    async fn fail(&self, err: AsrError) {
        {
            let mut session = self.session.lock().await;
            if !self.close_state(CloseKind::Error) {
                return;
            }
            session.last_error = Some(err.clone());
        }

        error!("Streaming session failed: {}", err);
        self.emit(TransportEvent::Error(err));
        self.close_socket().await;
    }

    async fn complete(&self) {
        let transcript = {
            let session = self.session.lock().await;
            if !self.close_state(CloseKind::Success) {
                return;
            }
            session.transcript.clone()
        };

        info!("Transcription complete ({} chars)", transcript.chars().count());
        self.emit(TransportEvent::Completed { transcript });
        self.close_socket().await;
    }

    async fn close_socket(&self) {
        if let Err(e) = self.sink.lock().await.close().await {
            debug!("Failed to close WebSocket cleanly: {}", e);
        }
    }

    fn aborted(&self, reason: impl Into<String>) -> AsrError {
        AsrError::StreamAborted {
            frames_sent: self.frames_sent.load(Ordering::SeqCst),
            reason: reason.into(),
        }
    }

    async fn handle_text(&self, text: &str) {
        if self.current().is_closed() {
            debug!("Ignoring message received after close");
            return;
        }

        let event = match decode(text) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!("Ignoring message without recognition content");
                return;
            }
            Err(e) => {
                let preview: String = text.chars().take(100).collect();
                warn!("Dropping undecodable message ({}): {}", e, preview);
                return;
            }
        };

        match event {
            InboundEvent::Handshake { session_id } => {
                info!("Handshake succeeded, session ID: {}", session_id);
                if !session_id.is_empty() {
                    self.session.lock().await.session_id = Some(session_id.clone());
                }
                self.advance(TransportState::Handshaking, TransportState::Ready);
                self.emit(TransportEvent::HandshakeSucceeded { session_id });
            }
            InboundEvent::Fragment(fragment) => {
                if fragment.is_final && !fragment.text.is_empty() {
                    let mut session = self.session.lock().await;
                    session.transcript.push_str(&fragment.text);
                }
                debug!(
                    "Fragment (final={}, last={}): {}",
                    fragment.is_final, fragment.is_last_segment, fragment.text
                );

                let last = fragment.is_last_segment;
                self.emit(TransportEvent::Fragment(fragment));
                if last {
                    self.complete().await;
                }
            }
            InboundEvent::ProtocolError { code, description } => {
                self.fail(AsrError::Protocol { code, description }).await;
            }
        }
    }
}

async fn read_loop(shared: Arc<Shared>, mut source: SplitStream<WsStream>) {
    let mut close_code = None;
    let mut close_reason = String::new();

    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => shared.handle_text(&text).await,
            Ok(Message::Binary(bytes)) => {
                debug!("Ignoring {} byte binary message", bytes.len());
            }
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    close_code = Some(u16::from(frame.code));
                    close_reason = frame.reason.to_string();
                }
                if !shared.current().is_closed() {
                    let reason = format!(
                        "remote closed the connection (code: {:?}, reason: {})",
                        close_code, close_reason
                    );
                    shared.fail(shared.aborted(reason)).await;
                }
            }
            Ok(_) => {}
            Err(e) => {
                if !shared.current().is_closed() {
                    shared.fail(shared.aborted(format!("transport error: {}", e))).await;
                }
                break;
            }
        }
    }

    if !shared.current().is_closed() {
        shared.fail(shared.aborted("connection dropped")).await;
    }
    shared.notify_closed(close_code, close_reason);
}

/// A live connection to the realtime ASR service
///
/// Inbound messages are decoded on a dedicated reader task and published as
/// [`TransportEvent`]s on the channel returned by [`StreamingTransport::connect`].
/// Callers observe the lifecycle through the wait primitives, which are safe
/// for any number of concurrent waiters.
pub struct StreamingTransport {
    shared: Arc<Shared>,
    state_rx: watch::Receiver<TransportState>,
    reader: JoinHandle<()>,
}

impl StreamingTransport {
    /// Open a connection to a signed URL
    pub async fn connect(
        url: &str,
        timeout: Duration,
    ) -> AsrResult<(Self, mpsc::UnboundedReceiver<TransportEvent>)> {
        let (state_tx, state_rx) = watch::channel(TransportState::Idle);
        state_tx.send_replace(TransportState::Connecting);
        debug!("Connecting to {}", url);

        // Already installed by an earlier connection (or the host application) is fine
        let _ = rustls::crypto::ring::default_provider().install_default();

        let (stream, _response) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| {
                AsrError::Connect(format!("timed out after {}ms", timeout.as_millis()))
            })?
            .map_err(|e| AsrError::Connect(e.to_string()))?;

        info!("WebSocket connection established");

        let (sink, source) = stream.split();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            state: state_tx,
            session: Mutex::new(SessionRecord::default()),
            sink: Mutex::new(sink),
            events: events_tx,
            frames_sent: AtomicUsize::new(0),
            close_notified: AtomicBool::new(false),
        });

        shared.advance(TransportState::Connecting, TransportState::Connected);
        shared.emit(TransportEvent::Connected);
        shared.advance(TransportState::Connected, TransportState::Handshaking);

        let reader = tokio::spawn(read_loop(Arc::clone(&shared), source));

        Ok((
            Self {
                shared,
                state_rx,
                reader,
            },
            events_rx,
        ))
    }

    pub fn state(&self) -> TransportState {
        *self.state_rx.borrow()
    }

    /// Receiver that observes every state change
    pub fn state_changes(&self) -> watch::Receiver<TransportState> {
        self.state_rx.clone()
    }

    pub fn frames_sent(&self) -> usize {
        self.shared.frames_sent.load(Ordering::SeqCst)
    }

    pub async fn session_id(&self) -> Option<String> {
        self.shared.session.lock().await.session_id.clone()
    }

    /// Final fragments received so far
    pub async fn transcript(&self) -> String {
        self.shared.session.lock().await.transcript.clone()
    }

    pub async fn last_error(&self) -> Option<AsrError> {
        self.shared.session.lock().await.last_error.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.shared.session.lock().await;
        SessionSnapshot {
            state: self.state(),
            session_id: session.session_id.clone(),
            transcript: session.transcript.clone(),
            last_error: session.last_error.clone(),
        }
    }

    /// Send one binary audio frame
    pub async fn send_audio(&self, frame: &[u8]) -> AsrResult<()> {
        let state = self.state();
        if !state.can_send() {
            return Err(AsrError::NotConnected { state });
        }

        let result = self
            .shared
            .sink
            .lock()
            .await
            .send(Message::Binary(frame.to_vec()))
            .await;

        if let Err(e) = result {
            let err = self.shared.aborted(format!("failed to send audio frame: {}", e));
            self.shared.fail(err.clone()).await;
            return Err(err);
        }

        self.shared.frames_sent.fetch_add(1, Ordering::SeqCst);
        self.shared
            .advance(TransportState::Ready, TransportState::Streaming);
        debug!("Sent audio frame ({} bytes)", frame.len());

        Ok(())
    }

    /// Send the end-of-stream marker; the service answers with the last segment
    pub async fn send_end(&self) -> AsrResult<()> {
        let state = self.state();
        if !state.can_send() {
            return Err(AsrError::NotConnected { state });
        }

        let session_id = self.session_id().await;
        let payload = serde_json::to_string(&EndOfStream::new(session_id.as_deref()))
            .unwrap_or_else(|_| r#"{"end":true}"#.to_string());

        let result = self
            .shared
            .sink
            .lock()
            .await
            .send(Message::Text(payload.clone()))
            .await;

        if let Err(e) = result {
            let err = self.shared.aborted(format!("failed to send end marker: {}", e));
            self.shared.fail(err.clone()).await;
            return Err(err);
        }

        if !self
            .shared
            .advance(TransportState::Streaming, TransportState::Ending)
        {
            self.shared.advance(TransportState::Ready, TransportState::Ending);
        }
        info!("Sent end-of-stream marker: {}", payload);

        Ok(())
    }

    /// Wait for the handshake acknowledgement
    pub async fn wait_ready(&self, timeout: Duration) -> AsrResult<()> {
        match self
            .wait_until(timeout, |state| state.is_ready() || state.is_closed())
            .await
        {
            Some(state) if state.is_ready() => Ok(()),
            Some(_) => Err(self.last_error().await.unwrap_or_else(|| {
                AsrError::Connect("connection closed before handshake".to_string())
            })),
            None => Err(AsrError::Timeout {
                stage: "handshake",
                waited_ms: millis(timeout),
            }),
        }
    }

    /// Wait until the connection reaches `Closed`; `false` on timeout
    pub async fn wait_closed(&self, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| state.is_closed())
            .await
            .is_some()
    }

    /// Force the connection closed, releasing every waiter
    pub async fn cancel(&self) {
        info!("Cancelling streaming session");
        self.shared.fail(AsrError::Cancelled).await;
    }

    async fn wait_until<F>(&self, timeout: Duration, predicate: F) -> Option<TransportState>
    where
        F: FnMut(&TransportState) -> bool,
    {
        let mut rx = self.state_rx.clone();
        let wait = async move { rx.wait_for(predicate).await.map(|state| *state) };

        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(state)) => Some(state),
            Ok(Err(_)) => Some(self.state()),
            Err(_) => None,
        }
    }
}

impl Drop for StreamingTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl FrameSink for StreamingTransport {
    async fn send_frame(&self, frame: &[u8]) -> AsrResult<()> {
        self.send_audio(frame).await
    }

    fn is_open(&self) -> bool {
        self.state().can_send()
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
