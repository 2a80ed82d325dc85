//! WebSocket transport for live ranking connections.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/{competition_id}/{category_id}?token=<jwt>`
//!    (the token is optional; anonymous viewers see public competitions)
//! 2. The connection is upgraded, then authorized by the [`LiveGateway`];
//!    denied connections are closed with code 4003
//! 3. The client receives `initial_ranking`, then every `ranking_update`
//!    pushed to its topic, filtered by its declared update types and the
//!    key's display settings
//! 4. Client requests are answered on the same socket
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8080/ws/12/3');
//!
//! ws.onmessage = (event) => {
//!   const message = JSON.parse(event.data);
//!   if (message.type === 'ranking_update') {
//!     applyChanges(message.update.payload.changes);
//!   }
//! };
//!
//! ws.send(JSON.stringify({ type: 'subscribe_updates', update_types: ['position_change'] }));
//! ```

use axum::{
    extract::{
        Path, Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use live_ranking::{
    auth::Viewer,
    live::{LiveConnection, ServerMessage},
    ranking::validate_key,
    scoring::RankingKey,
};
use log::{debug, info, warn};
use serde::Deserialize;

use super::{AppState, rankings::ranking_error};
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Upgrade HTTP connection to a live ranking WebSocket.
///
/// # Response
///
/// - `101 Switching Protocols` on success; authorization happens after the
///   upgrade so denied viewers get close code 4003
/// - `400 Bad Request` for non-positive identifiers
/// - `401 Unauthorized` for an invalid or expired token
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path((competition_id, category_id)): Path<(i64, i64)>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let key = match validate_key(competition_id, category_id) {
        Ok(key) => key,
        Err(e) => return ranking_error(e).into_response(),
    };

    let viewer = match state.tokens.viewer_from_token(query.token.as_deref()) {
        Ok(viewer) => viewer,
        Err(e) => {
            logging::log_security_event(
                "invalid_token",
                None,
                Some(competition_id),
                &e.to_string(),
            );
            return (StatusCode::UNAUTHORIZED, e.client_message()).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, key, viewer, state))
}

/// Drive one established connection until either side closes it.
async fn handle_socket(mut socket: WebSocket, key: RankingKey, viewer: Viewer, state: AppState) {
    let connection = match state.gateway.connect(key, viewer.clone()).await {
        Ok(connection) => connection,
        Err(e) => {
            let code = match e.close_code() {
                Some(code) => {
                    metrics::websocket_connections_denied();
                    logging::log_security_event(
                        "live_connection_denied",
                        viewer.user_id(),
                        Some(key.competition_id),
                        &format!("{viewer} may not view {key}"),
                    );
                    code
                }
                None => {
                    warn!("Live connection to {key} failed: {e}");
                    close_code::ERROR
                }
            };
            let frame = CloseFrame {
                code,
                reason: e.client_message().into(),
            };
            let _ = socket.send(Message::Close(Some(frame))).await;
            return;
        }
    };

    let LiveConnection {
        mut session,
        initial,
        mut updates,
    } = connection;
    metrics::websocket_connections_active(state.gateway.hub().connection_count().await);

    let (mut sender, mut receiver) = socket.split();

    if send_message(&mut sender, &initial).await {
        loop {
            tokio::select! {
                pushed = updates.recv() => {
                    let Some(message) = pushed else {
                        break;
                    };
                    if let Some(message) = state.gateway.render_push(&session, message).await {
                        if !send_message(&mut sender, &message).await {
                            break;
                        }
                    }
                }
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        metrics::websocket_messages_received();
                        let reply = state.gateway.handle_text(&mut session, text.as_str()).await;
                        if !send_message(&mut sender, &reply).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("WebSocket error on {key}: {e}");
                        break;
                    }
                }
            }
        }
    }

    state.gateway.disconnect(&session).await;
    metrics::websocket_connections_active(state.gateway.hub().connection_count().await);
    info!("WebSocket disconnected: {key}, viewer={viewer}");
}

/// Serialize and send one message. Returns false once the socket is gone.
async fn send_message(sender: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize live message: {e}");
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}
