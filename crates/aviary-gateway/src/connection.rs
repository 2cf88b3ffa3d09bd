use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, trace, warn};

use aviary_registry::Registry;

use crate::sessions::Sessions;

/// Heartbeat interval: the server sends a Ping every 30 seconds.
/// If 2 consecutive Pongs are missed (~60s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Drive one admitted push channel until it closes.
///
/// The gate already allowed the open and the registry row is in place.
/// Clients only listen on this socket; inbound text frames are ignored.
/// On exit the session is torn down and the registry row removed — the
/// remove is idempotent, so racing with gone-reclamation or the stale
/// sweep is fine.
pub async fn run_channel(
    socket: WebSocket,
    channel_id: String,
    subscriber_id: String,
    registry: Arc<Registry>,
    sessions: Sessions,
) {
    let (mut sender, mut receiver) = socket.split();
    let mut push_rx = sessions.register(&channel_id).await;

    info!("channel {} opened for subscriber {}", channel_id, subscriber_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward queued pushes to the client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                msg = push_rx.recv() => {
                    let Some(text) = msg else { break };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("heartbeat timeout (missed {} pongs), dropping channel", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let touch_registry = registry.clone();
    let touch_channel = channel_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                    if let Err(e) = touch_registry.touch(&touch_channel, Utc::now()) {
                        debug!("last_seen update failed for {}: {}", touch_channel, e);
                    }
                }
                Message::Text(text) => {
                    trace!("ignoring client frame on {} ({} bytes)", touch_channel, text.len());
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    sessions.unregister(&channel_id).await;
    if let Err(e) = registry.remove(&channel_id) {
        // The stale sweep is the backstop if this fails
        error!("failed to deregister channel {}: {}", channel_id, e);
    }

    info!("channel {} closed for subscriber {}", channel_id, subscriber_id);
}
