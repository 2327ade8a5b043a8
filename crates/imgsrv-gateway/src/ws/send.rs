use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use std::time::Duration;

pub type ViewerSink = SplitSink<WebSocket, Message>;

/// Send a pre-serialized JSON payload as one text message.
///
/// A viewer that does not accept the message within `timeout` counts as
/// failed, same as a broken socket.
pub async fn text(tx: &mut ViewerSink, payload: &str, timeout: Duration) -> Result<(), axum::Error> {
    match tokio::time::timeout(timeout, tx.send(Message::Text(payload.to_string().into()))).await {
        Ok(res) => res.map_err(axum::Error::new),
        Err(elapsed) => Err(axum::Error::new(elapsed)),
    }
}

/// Best-effort close frame; errors are ignored since the peer may be gone.
pub async fn close(tx: &mut ViewerSink) {
    let _ = tx.send(Message::Close(None)).await;
}
