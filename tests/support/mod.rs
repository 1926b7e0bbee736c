//! In-process stand-in for the realtime ASR service
//!
//! Speaks just enough of the wire protocol to drive the client end to end:
//! a `started` acknowledgement, result messages keyed off the audio it
//! receives, and the terminal `ls` result after the end marker.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use visit_asr::{Credentials, RequestSigner, SessionConfig, Transcriber};

/// Frames between result messages in `Behavior::Normal`
pub const FRAMES_PER_RESULT: usize = 25;

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Interim + final result every 25 frames, `ls` after the end marker.
    /// The final word is the first byte of the triggering frame, as decimal.
    Normal,

    /// Final word `e` on the first frame, then protocol error `10001` after
    /// the given number of frames
    ErrorAfter(usize),

    /// One final word `p` on the first frame, never a last segment
    NoFinal,

    /// Accept TCP connections and drop them before the WebSocket handshake
    Reject,
}

#[derive(Debug, Default)]
pub struct MockStats {
    pub connections: AtomicUsize,
    pub frames: AtomicUsize,
    pub frames_after_error: AtomicUsize,
    pub end_messages: AtomicUsize,
    pub uris: Mutex<Vec<String>>,
}

impl MockStats {
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn frames_after_error(&self) -> usize {
        self.frames_after_error.load(Ordering::SeqCst)
    }

    pub fn end_messages(&self) -> usize {
        self.end_messages.load(Ordering::SeqCst)
    }

    pub fn uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }
}

pub struct MockAsrServer {
    pub addr: SocketAddr,
    pub stats: Arc<MockStats>,
    task: JoinHandle<()>,
}

impl MockAsrServer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stats = Arc::new(MockStats::default());

        let accept_stats = Arc::clone(&stats);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let number = accept_stats.connections.fetch_add(1, Ordering::SeqCst) + 1;
                if matches!(behavior, Behavior::Reject) {
                    drop(stream);
                    continue;
                }
                tokio::spawn(serve(stream, behavior, Arc::clone(&accept_stats), number));
            }
        });

        Self { addr, stats, task }
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}/ast/communicate/v1", self.addr)
    }

    pub fn signer(&self) -> RequestSigner {
        RequestSigner::new(self.endpoint(), test_credentials()).unwrap()
    }

    pub fn transcriber(&self) -> Transcriber {
        Transcriber::new(self.signer(), test_session_config())
    }

    pub fn transcriber_with(&self, config: SessionConfig) -> Transcriber {
        Transcriber::new(self.signer(), config)
    }
}

impl Drop for MockAsrServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn test_credentials() -> Credentials {
    Credentials {
        app_id: "test-app".to_string(),
        access_key_id: "test-key".to_string(),
        access_secret: "test-secret".to_string(),
    }
}

/// Production cadence with short waits
pub fn test_session_config() -> SessionConfig {
    SessionConfig {
        ready_grace_ms: 50,
        connect_timeout_ms: 2000,
        handshake_timeout_ms: 1000,
        retry_backoff_ms: 50,
        completion_margin_ms: 2000,
        end_timeout_ms: 2000,
        ..SessionConfig::default()
    }
}

fn result_message(kind: u8, word: &str, last: bool) -> Message {
    let body = json!({
        "action": "result",
        "code": "0",
        "data": {
            "cn": { "st": { "type": kind.to_string(), "rt": [ { "ws": [ { "cw": [ { "w": word } ] } ] } ] } },
            "ls": last,
        },
    });
    Message::Text(body.to_string())
}

async fn serve(stream: TcpStream, behavior: Behavior, stats: Arc<MockStats>, number: usize) {
    let uri_stats = Arc::clone(&stats);
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        uri_stats.uris.lock().unwrap().push(request.uri().to_string());
        Ok(response)
    };

    let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };
    let (mut tx, mut rx) = ws.split();

    let started = json!({
        "action": "started",
        "code": "0",
        "desc": "success",
        "sid": format!("mock-sid-{}", number),
    });
    if tx.send(Message::Text(started.to_string())).await.is_err() {
        return;
    }

    let mut frames = 0usize;
    let mut errored = false;

    while let Some(Ok(message)) = rx.next().await {
        match message {
            Message::Binary(data) => {
                stats.frames.fetch_add(1, Ordering::SeqCst);
                frames += 1;
                if errored {
                    stats.frames_after_error.fetch_add(1, Ordering::SeqCst);
                    continue;
                }

                let replies = match behavior {
                    Behavior::Normal if frames % FRAMES_PER_RESULT == 0 => {
                        let word = data.first().map(|b| b.to_string()).unwrap_or_default();
                        vec![result_message(1, "嗯", false), result_message(0, &word, false)]
                    }
                    Behavior::ErrorAfter(n) if frames == 1 && n > 1 => {
                        vec![result_message(0, "e", false)]
                    }
                    Behavior::ErrorAfter(n) if frames == n => {
                        errored = true;
                        let error = json!({
                            "action": "error",
                            "code": "10001",
                            "desc": "illegal audio",
                        });
                        vec![Message::Text(error.to_string())]
                    }
                    Behavior::NoFinal if frames == 1 => vec![result_message(0, "p", false)],
                    _ => Vec::new(),
                };

                for reply in replies {
                    if tx.send(reply).await.is_err() {
                        return;
                    }
                }
            }
            Message::Text(text) => {
                if text.contains("\"end\"") {
                    stats.end_messages.fetch_add(1, Ordering::SeqCst);
                    if matches!(behavior, Behavior::Normal) {
                        let last = json!({ "action": "result", "data": { "ls": true } });
                        let _ = tx.send(Message::Text(last.to_string())).await;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

/// PCM buffer where every frame starts with `tag`
pub fn tagged_audio(len: usize, tag: u8) -> Vec<u8> {
    vec![tag; len]
}
