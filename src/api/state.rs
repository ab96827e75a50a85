use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};

use crate::config::Config;
use crate::events::SessionEvent;
use crate::recording::RecorderHandle;

/// Connected WebSocket client info
#[derive(Debug)]
pub struct ConnectedClient {
    pub connected_at: Instant,
}

/// A running session
pub struct ActiveSession {
    pub handle: RecorderHandle,
    /// Optional client ID that started this session
    pub client_id: Option<String>,
}

/// Shared application state
pub struct AppState {
    pub config: Config,

    /// Sessions: session_id -> recorder handle
    pub sessions: DashMap<String, ActiveSession>,

    /// Connected WebSocket clients: client_id -> client info
    pub connected_clients: DashMap<String, ConnectedClient>,

    /// Total connection count (for metrics)
    connection_count: AtomicUsize,

    /// Broadcast channel for session events
    pub ws_broadcast: broadcast::Sender<SessionEvent>,

    /// Serializes browser launches so two requests never race for Chrome
    pub session_lock: Mutex<()>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let (tx, _) = broadcast::channel(1024);

        Self {
            config,
            sessions: DashMap::new(),
            connected_clients: DashMap::new(),
            connection_count: AtomicUsize::new(0),
            ws_broadcast: tx,
            session_lock: Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.ws_broadcast.subscribe()
    }

    pub fn handle(&self, session_id: &str) -> Option<RecorderHandle> {
        self.sessions.get(session_id).map(|s| s.handle.clone())
    }

    /// Register a WebSocket client connection
    pub fn client_connected(&self, client_id: &str) {
        self.connected_clients.insert(
            client_id.to_string(),
            ConnectedClient {
                connected_at: Instant::now(),
            },
        );
        let count = self.connection_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            "Client {} connected (total: {}, active: {})",
            client_id,
            count,
            self.connected_clients.len()
        );
    }

    /// Unregister a WebSocket client and exit the sessions it started
    pub fn client_disconnected(&self, client_id: &str) {
        if let Some((_, client)) = self.connected_clients.remove(client_id) {
            let duration = client.connected_at.elapsed();
            tracing::debug!(
                "Client {} disconnected after {:?} (active: {})",
                client_id,
                duration,
                self.connected_clients.len()
            );
        }

        let orphaned: Vec<String> = self
            .sessions
            .iter()
            .filter(|s| s.client_id.as_deref() == Some(client_id))
            .map(|s| s.key().clone())
            .collect();

        for session_id in orphaned {
            if let Some((_, session)) = self.sessions.remove(&session_id) {
                tracing::info!("Cleaning up orphaned session: {}", session_id);
                tokio::spawn(async move {
                    if let Err(e) = session.handle.exit().await {
                        tracing::debug!("Orphaned session {} already closed: {}", session_id, e);
                    }
                });
            }
        }
    }

    pub fn active_connection_count(&self) -> usize {
        self.connected_clients.len()
    }
}
