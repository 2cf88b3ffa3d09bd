use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::{error, warn};
use uuid::Uuid;

use aviary_auth::{ConnectionGate, Effect, OpenRequest};
use aviary_dispatch::{BatchSummary, Dispatcher};
use aviary_gateway::{SessionTransport, Sessions, connection};
use aviary_registry::Registry;
use aviary_types::MutationEvent;

#[derive(Clone)]
pub struct AppState {
    pub gate: ConnectionGate,
    pub registry: Arc<Registry>,
    pub sessions: Sessions,
    pub dispatcher: Arc<Dispatcher<SessionTransport>>,
    pub feed_token: Option<String>,
}

/// Channel open: the gate decides from the query parameters before the
/// upgrade completes. On Allow, the platform assigns the channel id, the
/// registry row is written, and the socket enters the connection loop.
pub async fn open_channel(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let decision = state.gate.authorize(&OpenRequest { query: params }).await;

    if decision.effect != Effect::Allow {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    let channel_id = Uuid::new_v4().to_string();
    let subscriber_id = decision.principal;

    // A write failure here is fatal for this open attempt; the client's
    // reconnect re-drives it.
    if let Err(e) = state.registry.insert(&channel_id, &subscriber_id, Utc::now()) {
        error!("failed to register channel {}: {}", channel_id, e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "registry unavailable").into_response();
    }

    let registry = state.registry.clone();
    let sessions = state.sessions.clone();
    ws.on_upgrade(move |socket| {
        connection::run_channel(socket, channel_id, subscriber_id, registry, sessions)
    })
}

/// Mutation-feed ingest: a batch of change events from the metadata store.
/// Redelivery of the same batch is tolerated; fan-out is best-effort per
/// channel and the summary reports what happened.
pub async fn ingest_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(batch): Json<Vec<MutationEvent>>,
) -> Result<Json<BatchSummary>, StatusCode> {
    if let Some(expected) = &state.feed_token {
        let presented = headers
            .get("x-feed-token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if presented != expected {
            warn!("feed request with missing or bad token");
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    let summary = state.dispatcher.process(&batch).await;
    Ok(Json(summary))
}

pub async fn health() -> &'static str {
    "ok"
}
