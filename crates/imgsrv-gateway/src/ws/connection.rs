use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::StreamExt;
use imgsrv_core::error::ImgsrvError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::app::{AppState, ViewerInfo};
use crate::ws::send;

/// Axum handler: upgrades HTTP to WebSocket at GET /data.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| run_connection(socket, state))
}

/// Per-viewer push loop. Lives until the viewer leaves or is dropped.
///
/// Viewers never send anything meaningful; inbound traffic is only watched
/// for the connection going away.
async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let mut sub = match state.session.subscribe().await {
        Ok(sub) => sub,
        Err(e) => {
            warn!(error = %e, "viewer rejected, publisher is gone");
            return;
        }
    };
    let viewer_id = sub.id;
    state.viewers.insert(viewer_id, ViewerInfo::new());
    info!(viewer = %viewer_id, "viewer connected");

    let (mut tx, mut rx) = socket.split();
    let send_timeout = Duration::from_millis(state.config.publisher.viewer_send_timeout_ms);

    loop {
        tokio::select! {
            out = sub.recv() => match out {
                Some(mut out) => {
                    if let Err(e) = send::text(&mut tx, &out.payload, send_timeout).await {
                        let err = ImgsrvError::ViewerSendFailed {
                            viewer: viewer_id.to_string(),
                            reason: e.to_string(),
                        };
                        warn!(code = err.code(), error = %err, "dropping viewer");
                        break;
                    }
                    out.confirm();
                    if let Some(mut info) = state.viewers.get_mut(&viewer_id) {
                        info.frames_sent += 1;
                    }
                    debug!(viewer = %viewer_id, seq = out.seq, "frame pushed");
                }
                None => {
                    // the broadcaster cut this viewer off
                    send::close(&mut tx).await;
                    break;
                }
            },

            _ = state.shutdown.cancelled() => {
                send::close(&mut tx).await;
                break;
            }

            // pings are answered by the socket itself while it is read
            msg = rx.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },
        }
    }

    state.session.broadcaster().unsubscribe(viewer_id).await;
    if let Some((_, info)) = state.viewers.remove(&viewer_id) {
        let connected_secs = (chrono::Utc::now() - info.connected_at).num_seconds();
        info!(
            viewer = %viewer_id,
            frames_sent = info.frames_sent,
            connected_secs,
            "viewer disconnected"
        );
    }
}
