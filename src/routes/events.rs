// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WebSocket stream of per-user notifications.
//!
//! Each connection receives every event emitted for its user as a JSON
//! text frame `{ "event": ..., "payload": ... }`. Clients may send the
//! text frame `request_insight` to trigger insight generation; the result
//! arrives as a `new_insight` event (or an `insight` event with
//! `has_data: false` when there is nothing to report).

use crate::middleware::auth::AuthUser;
use crate::routes::insights::InsightResponse;
use crate::services::notify::{events, Notification, NotificationSink};
use crate::services::InsightOutcome;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Extension, Router,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Client command requesting a fresh insight.
const REQUEST_INSIGHT: &str = "request_insight";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/events", get(events_handler))
}

async fn events_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user.user_id))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let mut rx = state.hub.subscribe(&user_id);
    tracing::info!(user_id = %user_id, "Event stream connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if text.as_str().trim() == REQUEST_INSIGHT {
                            if let Some(reply) = request_insight(&state, &user_id).await {
                                if send_notification(&mut socket, &reply).await.is_err() {
                                    break;
                                }
                            }
                        } else {
                            tracing::debug!(user_id = %user_id, "Ignoring unknown client message");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
            notification = rx.recv() => {
                match notification {
                    Ok(notification) => {
                        if send_notification(&mut socket, &notification).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(user_id = %user_id, skipped, "Event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    drop(rx);
    state.hub.prune(&user_id);
    tracing::info!(
        user_id = %user_id,
        connected_users = state.hub.connected_users(),
        "Event stream disconnected"
    );
}

/// Run the insight generator for a client request.
///
/// A generated insight is broadcast to all of the user's connections, so
/// only the no-data and error cases need a direct reply.
async fn request_insight(state: &AppState, user_id: &str) -> Option<Notification> {
    match state
        .insight_generator()
        .generate(user_id, chrono::Utc::now())
        .await
    {
        Ok(InsightOutcome::Generated(summary)) => {
            state
                .hub
                .emit(user_id, events::NEW_INSIGHT, summary.to_payload());
            None
        }
        Ok(InsightOutcome::NoData) => Some(Notification {
            event: "insight".to_string(),
            payload: serde_json::to_value(InsightResponse::no_data()).unwrap_or_default(),
        }),
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Insight request over event stream failed");
            Some(Notification {
                event: "error".to_string(),
                payload: serde_json::json!({ "message": "insight generation failed" }),
            })
        }
    }
}

async fn send_notification(
    socket: &mut WebSocket,
    notification: &Notification,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(notification).unwrap_or_default();
    socket.send(Message::Text(json.into())).await
}
