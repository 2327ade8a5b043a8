use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use imgsrv_core::config::ImgsrvConfig;
use imgsrv_publisher::{Session, ViewerId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Bookkeeping for one open push connection.
#[derive(Debug, Clone)]
pub struct ViewerInfo {
    pub connected_at: DateTime<Utc>,
    pub frames_sent: u64,
}

impl ViewerInfo {
    pub fn new() -> Self {
        Self {
            connected_at: Utc::now(),
            frames_sent: 0,
        }
    }
}

impl Default for ViewerInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: ImgsrvConfig,
    pub session: Session,
    /// Open viewer connections: viewer id -> info.
    pub viewers: DashMap<ViewerId, ViewerInfo>,
    /// Viewer page, rendered once with the configured title.
    pub page: String,
    /// Cancelled on server shutdown; ends every viewer connection.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: ImgsrvConfig, session: Session) -> Self {
        let page = crate::http::page::render(&config.page.title);
        Self {
            config,
            session,
            viewers: DashMap::new(),
            page,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(crate::http::page::page_handler))
        .route("/data", get(crate::ws::connection::ws_handler))
        .route("/health", get(crate::http::health::health_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use imgsrv_core::config::PublisherConfig;
    use imgsrv_publisher::PublisherState;
    use tower::ServiceExt;

    fn state(title: &str) -> Arc<AppState> {
        let mut config = ImgsrvConfig::default();
        config.page.title = title.to_string();
        let session = Session::new(&PublisherConfig::default());
        Arc::new(AppState::new(config, session))
    }

    async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, String) {
        let res = build_router(Arc::clone(state))
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn page_request_arms_session() {
        let state = state("Monte Carlo");
        assert!(!state.session.is_armed());

        let (status, body) = get(&state, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<title>Monte Carlo</title>"));
        assert!(body.contains("/data"));
        assert!(state.session.is_armed());
    }

    #[tokio::test]
    async fn health_reports_state_and_viewers() {
        let state = state("imgsrv");

        let (status, body) = get(&state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["state"], "idle");
        assert_eq!(json["viewers"], 0);
        assert!(json["oldest_viewer"].is_null());

        get(&state, "/").await;
        // the coordination loop applies the page request asynchronously
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while state.session.state() != PublisherState::Armed {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let (_, body) = get(&state, "/health").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["state"], "armed");
        assert_eq!(json["armed"], true);
    }

    #[tokio::test]
    async fn health_does_not_arm() {
        let state = state("imgsrv");
        get(&state, "/health").await;
        assert!(!state.session.is_armed());
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let state = state("imgsrv");
        let (status, _) = get(&state, "/stream").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
