use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::transport::StreamingTransport;

/// Opaque handle for an incremental transcription session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(uuid::Uuid);

impl SessionHandle {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for SessionHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

enum Slot {
    Live(Arc<StreamingTransport>),
    /// Closed before the caller ended it; kept so `end` can report the failure
    Finished(Arc<StreamingTransport>),
}

impl Slot {
    fn transport(&self) -> &Arc<StreamingTransport> {
        match self {
            Slot::Live(transport) | Slot::Finished(transport) => transport,
        }
    }

    fn is_live(&self) -> bool {
        matches!(self, Slot::Live(_))
    }
}

/// Incremental sessions by handle
///
/// Entries are locked per shard, so operations on different handles do not
/// contend. When a connection closes on its own, its entry leaves the live set
/// but stays addressable until the caller ends or cancels the handle.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionHandle, Slot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport and start watching it for close
    pub fn insert(&self, transport: StreamingTransport) -> SessionHandle {
        let handle = SessionHandle::new();
        let mut state_rx = transport.state_changes();
        self.sessions.insert(handle, Slot::Live(Arc::new(transport)));
        info!("Registered session {}", handle);

        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            // Err means the transport was dropped, which also ends the session
            let _ = state_rx.wait_for(|state| state.is_closed()).await;

            if let Some(mut slot) = sessions.get_mut(&handle) {
                let closed = match &*slot {
                    Slot::Live(transport) => Some(Arc::clone(transport)),
                    Slot::Finished(_) => None,
                };
                if let Some(transport) = closed {
                    *slot = Slot::Finished(transport);
                    debug!("Session {} closed, no longer live", handle);
                }
            }
        });

        handle
    }

    /// Look up a session, live or finished; the map lock is released before returning
    pub fn get(&self, handle: &SessionHandle) -> Option<Arc<StreamingTransport>> {
        self.sessions
            .get(handle)
            .map(|entry| Arc::clone(entry.value().transport()))
    }

    /// Take a session out of the registry for good
    pub fn remove(&self, handle: &SessionHandle) -> Option<Arc<StreamingTransport>> {
        self.sessions
            .remove(handle)
            .map(|(_, slot)| Arc::clone(slot.transport()))
    }

    pub fn is_live(&self, handle: &SessionHandle) -> bool {
        self.sessions
            .get(handle)
            .is_some_and(|entry| entry.value().is_live())
    }

    /// Sessions whose connection is still open
    pub fn len(&self) -> usize {
        self.sessions.iter().filter(|entry| entry.value().is_live()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sessions that closed on their own and await `end` or `cancel`
    pub fn finished_len(&self) -> usize {
        self.sessions.iter().filter(|entry| !entry.value().is_live()).count()
    }
}
