use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;

use aviary_dispatch::{PushTransport, SendOutcome};
use aviary_types::FanoutPayload;

/// Live WebSocket sessions: channel_id -> sender half of the per-connection
/// push queue. The durable registry is the source of truth for which
/// channels exist; this map only knows which ones this process can reach.
#[derive(Clone, Default)]
pub struct Sessions {
    inner: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<String>>>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for a channel. Returns the receiver the
    /// connection loop drains into the socket.
    pub async fn register(&self, channel_id: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().await.insert(channel_id.to_string(), tx);
        rx
    }

    pub async fn unregister(&self, channel_id: &str) {
        self.inner.write().await.remove(channel_id);
    }

    /// Queue a text frame for a channel. False means the channel is not
    /// reachable from this process (never registered, or its loop exited).
    pub async fn send(&self, channel_id: &str, text: String) -> bool {
        let sessions = self.inner.read().await;
        match sessions.get(channel_id) {
            Some(tx) => tx.send(text).is_ok(),
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// PushTransport over the live session table. An unreachable channel is a
/// permanent failure: its registry row should be reclaimed.
#[derive(Clone)]
pub struct SessionTransport {
    sessions: Sessions,
}

impl SessionTransport {
    pub fn new(sessions: Sessions) -> Self {
        Self { sessions }
    }
}

impl PushTransport for SessionTransport {
    async fn send(&self, channel_id: &str, payload: &FanoutPayload) -> SendOutcome {
        let text = match serde_json::to_string(payload) {
            Ok(text) => text,
            Err(e) => return SendOutcome::Transient(e.to_string()),
        };

        if self.sessions.send(channel_id, text).await {
            SendOutcome::Delivered
        } else {
            debug!("channel {} has no live session", channel_id);
            SendOutcome::Gone
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn payload() -> FanoutPayload {
        FanoutPayload::FileUpdate {
            item_id: "f1".to_string(),
            item_type: Some("image".to_string()),
            thumbnail_url: None,
            tag_map: BTreeMap::new(),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn registered_session_receives_pushes() {
        let sessions = Sessions::new();
        let mut rx = sessions.register("c1").await;

        let transport = SessionTransport::new(sessions);
        assert_eq!(transport.send("c1", &payload()).await, SendOutcome::Delivered);

        let text = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], json!("FILE_UPDATE"));
        assert_eq!(value["item_id"], json!("f1"));
    }

    #[tokio::test]
    async fn unknown_channel_is_gone() {
        let transport = SessionTransport::new(Sessions::new());
        assert_eq!(transport.send("nope", &payload()).await, SendOutcome::Gone);
    }

    #[tokio::test]
    async fn dropped_receiver_is_gone() {
        let sessions = Sessions::new();
        let rx = sessions.register("c1").await;
        drop(rx);

        let transport = SessionTransport::new(sessions);
        assert_eq!(transport.send("c1", &payload()).await, SendOutcome::Gone);
    }

    #[tokio::test]
    async fn unregister_removes_the_session() {
        let sessions = Sessions::new();
        let _rx = sessions.register("c1").await;
        assert_eq!(sessions.len().await, 1);

        sessions.unregister("c1").await;
        assert!(sessions.is_empty().await);
    }
}
