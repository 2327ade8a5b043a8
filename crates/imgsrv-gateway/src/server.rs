use imgsrv_core::config::ImgsrvConfig;
use imgsrv_core::error::{ImgsrvError, Result};
use imgsrv_publisher::Session;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::{build_router, AppState};
use crate::net;

/// Running page server. Dropping the handle does not stop the server; call
/// [`ServerHandle::shutdown`].
pub struct ServerHandle {
    local_addr: SocketAddr,
    advertised: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn advertised(&self) -> SocketAddr {
        self.advertised
    }

    /// URL a browser should open to become a viewer.
    pub fn url(&self) -> String {
        format!("http://{}/", self.advertised)
    }

    /// Stop accepting connections and close every open viewer socket.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub async fn join(self) -> Result<()> {
        match self.task.await {
            Ok(res) => res.map_err(ImgsrvError::Io),
            Err(e) => Err(ImgsrvError::Io(std::io::Error::other(e))),
        }
    }
}

/// Serve the viewer page and push endpoint for an existing session.
pub async fn serve(config: ImgsrvConfig, session: Session) -> Result<ServerHandle> {
    let listener = net::bind_listener(&config.server).await?;
    let local_addr = listener.local_addr()?;
    let advertised = net::advertised_addr(&config.server, local_addr).await?;

    let state = Arc::new(AppState::new(config, session));
    let shutdown = state.shutdown.clone();
    let router = build_router(state);

    let signal = shutdown.clone().cancelled_owned();
    let task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await
    });

    info!(%local_addr, url = %format!("http://{advertised}/"), "imgsrv listening");
    Ok(ServerHandle {
        local_addr,
        advertised,
        shutdown,
        task,
    })
}

/// Create a session and start serving it.
pub async fn start(config: ImgsrvConfig) -> Result<(Session, ServerHandle)> {
    let session = Session::new(&config.publisher);
    let handle = serve(config, session.clone()).await?;
    Ok((session, handle))
}
