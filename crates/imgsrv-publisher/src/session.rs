use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use imgsrv_codec::{FrameCodec, PngCodec};
use imgsrv_core::config::PublisherConfig;
use imgsrv_core::error::{ImgsrvError, Result};
use imgsrv_core::types::{FrameSource, PixelGrid};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tracing::{debug, info};

use crate::blocking::BlockingSession;
use crate::broadcaster::{Broadcaster, ViewerSubscription};
use crate::coordinator::{Command, Coordinator};
use crate::state::PublisherState;

/// Handle to one visualization session. Cheap to clone; the producer, the
/// page server and every viewer connection hold their own copy.
///
/// Must be created inside a Tokio runtime: construction spawns the
/// coordination loop and the broadcaster.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    cmd_tx: mpsc::Sender<Command>,
    gate_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<PublisherState>,
    done_rx: watch::Receiver<bool>,
    broadcaster: Broadcaster,
    // serializes producers; held from the gate wait until the frame is consumed
    producer: Mutex<()>,
}

impl Session {
    pub fn new(config: &PublisherConfig) -> Self {
        Self::with_codec(config, Arc::new(PngCodec))
    }

    pub fn with_codec(config: &PublisherConfig, codec: Arc<dyn FrameCodec>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let (frames_tx, frames_rx) = mpsc::channel(config.frame_queue.max(1));
        let (gate_tx, gate_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(PublisherState::Idle);
        let (done_tx, done_rx) = watch::channel(false);

        let broadcaster = Broadcaster::spawn(frames_rx, config.viewer_queue);
        let coordinator = Coordinator {
            state: PublisherState::Idle,
            state_tx,
            gate_rx,
            cmd_rx,
            frames_tx,
            done_tx,
            codec,
            finish_timeout: Duration::from_millis(config.finish_timeout_ms),
            seq: 0,
        };
        tokio::spawn(coordinator.run());

        Self {
            inner: Arc::new(Inner {
                cmd_tx,
                gate_tx,
                state_rx,
                done_rx,
                broadcaster,
                producer: Mutex::new(()),
            }),
        }
    }

    /// Synchronous wrapper for producers on plain threads.
    ///
    /// Captures the current runtime handle, so call this from inside the
    /// runtime and move the result to the producer thread.
    pub fn blocking(&self) -> BlockingSession {
        BlockingSession::new(self.clone(), tokio::runtime::Handle::current())
    }

    /// Record that a viewer requested the page. Only the first call has an
    /// effect; returns whether this call armed the gate.
    pub fn arm(&self) -> bool {
        let armed = self.inner.gate_tx.send_if_modified(|armed| {
            if *armed {
                false
            } else {
                *armed = true;
                true
            }
        });
        if armed {
            debug!("rendezvous gate armed");
        }
        armed
    }

    pub fn is_armed(&self) -> bool {
        *self.inner.gate_tx.borrow()
    }

    pub fn state(&self) -> PublisherState {
        *self.inner.state_rx.borrow()
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }

    pub async fn subscribe(&self) -> Result<ViewerSubscription> {
        self.inner.broadcaster.subscribe().await
    }

    /// Publish a pixel grid, pushed as `{ "title", "image" }`.
    ///
    /// The first call blocks until a viewer has requested the page. Returns
    /// once the frame has been consumed, not once viewers have received it.
    pub async fn publish(&self, title: impl Into<String>, pixels: PixelGrid) -> Result<()> {
        let source = FrameSource::Pixels {
            title: title.into(),
            grid: pixels,
        };
        self.submit(source, |source, reply| Command::Publish { source, reply })
            .await
    }

    /// Publish a pre-rendered chart PNG, pushed as `{ "plot" }`.
    pub async fn publish_plot(&self, title: impl Into<String>, png: Vec<u8>) -> Result<()> {
        let source = FrameSource::Plot {
            title: title.into(),
            png,
        };
        self.submit(source, |source, reply| Command::Publish { source, reply })
            .await
    }

    /// Publish the final frame and close the session.
    ///
    /// Returns after the broadcaster has confirmed delivery of the frame to
    /// the connected viewers, or after `finish_timeout_ms`.
    pub async fn finish(&self, title: impl Into<String>, pixels: PixelGrid) -> Result<()> {
        let source = FrameSource::Pixels {
            title: title.into(),
            grid: pixels,
        };
        self.submit(source, |source, reply| Command::Finish { source, reply })
            .await?;
        self.wait().await;
        Ok(())
    }

    pub async fn finish_plot(&self, title: impl Into<String>, png: Vec<u8>) -> Result<()> {
        let source = FrameSource::Plot {
            title: title.into(),
            png,
        };
        self.submit(source, |source, reply| Command::Finish { source, reply })
            .await?;
        self.wait().await;
        Ok(())
    }

    /// Block until `finish` has completed, or the session is gone.
    pub async fn wait(&self) {
        let mut done_rx = self.inner.done_rx.clone();
        let _ = done_rx.wait_for(|done| *done).await;
    }

    /// Write the most recently published frame to `path` as PNG.
    pub async fn print(&self, path: impl AsRef<Path>) -> Result<()> {
        let frame = self
            .inner
            .broadcaster
            .latest()
            .await?
            .ok_or(ImgsrvError::NoFrame)?;
        let path = path.as_ref().to_path_buf();

        tokio::task::spawn_blocking(move || imgsrv_codec::write_png(&frame, &path))
            .await
            .map_err(|e| ImgsrvError::Io(std::io::Error::other(e)))?
    }

    async fn submit(
        &self,
        source: FrameSource,
        command: impl FnOnce(FrameSource, oneshot::Sender<Result<()>>) -> Command,
    ) -> Result<()> {
        // fail fast after finish, without queueing behind another producer
        self.ensure_open()?;
        let _producer = self.inner.producer.lock().await;
        self.await_viewer().await?;

        let (reply, rx) = oneshot::channel();
        self.inner
            .cmd_tx
            .send(command(source, reply))
            .await
            .map_err(|_| ImgsrvError::Closed)?;
        rx.await.map_err(|_| ImgsrvError::Closed)?
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state() == PublisherState::Closed {
            return Err(ImgsrvError::Closed);
        }
        Ok(())
    }

    /// The rendezvous: wait until some viewer has requested the page.
    async fn await_viewer(&self) -> Result<()> {
        let mut state_rx = self.inner.state_rx.clone();
        if !state_rx.borrow().viewer_seen() {
            info!("waiting for a viewer to request the page");
        }

        let state = *state_rx
            .wait_for(PublisherState::viewer_seen)
            .await
            .map_err(|_| ImgsrvError::Closed)?;
        if state == PublisherState::Closed {
            return Err(ImgsrvError::Closed);
        }
        Ok(())
    }
}
