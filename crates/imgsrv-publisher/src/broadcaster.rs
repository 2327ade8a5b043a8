//! Fan-out of published frames to connected viewers.
//!
//! A single task owns the viewer table and the latest frame. Frames, new
//! subscriptions and removals all pass through that task, so a viewer that
//! joins mid-stream gets exactly one snapshot followed by every later frame.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use imgsrv_core::error::{ImgsrvError, Result};
use imgsrv_core::types::Frame;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

const CONTROL_CAPACITY: usize = 64;

pub type ViewerId = Uuid;

/// One wire message queued for one viewer.
#[derive(Debug)]
pub struct Outbound {
    pub seq: u64,
    /// Serialized JSON, identical for every viewer.
    pub payload: Arc<str>,
    delivered: Option<oneshot::Sender<()>>,
}

impl Outbound {
    /// Report that the payload reached the viewer. Only frames published by
    /// `finish` wait on this; for the rest it is a no-op.
    pub fn confirm(&mut self) {
        if let Some(tx) = self.delivered.take() {
            let _ = tx.send(());
        }
    }
}

/// Result of delivering one acknowledged frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Viewers the frame was queued for.
    pub viewers: usize,
    /// Viewers that confirmed the write.
    pub delivered: usize,
}

/// A frame on its way from the coordination loop to the broadcaster.
pub(crate) struct Delivery {
    pub seq: u64,
    pub frame: Arc<Frame>,
    pub payload: Arc<str>,
    pub ack: Option<oneshot::Sender<DeliveryReport>>,
}

/// Receiving end of one viewer's queue. Dropping it unsubscribes lazily.
#[derive(Debug)]
pub struct ViewerSubscription {
    pub id: ViewerId,
    rx: mpsc::Receiver<Outbound>,
}

impl ViewerSubscription {
    /// Next message, or `None` once the broadcaster dropped this viewer.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Outbound> {
        self.rx.try_recv().ok()
    }
}

enum Control {
    Subscribe {
        reply: oneshot::Sender<ViewerSubscription>,
    },
    Unsubscribe {
        id: ViewerId,
    },
    Latest {
        reply: oneshot::Sender<Option<Arc<Frame>>>,
    },
    ViewerCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to the broadcast task.
#[derive(Clone)]
pub struct Broadcaster {
    ctl_tx: mpsc::Sender<Control>,
}

impl Broadcaster {
    /// Start the broadcast task. It runs until every handle is dropped.
    pub(crate) fn spawn(frames_rx: mpsc::Receiver<Delivery>, viewer_queue: usize) -> Self {
        let (ctl_tx, ctl_rx) = mpsc::channel(CONTROL_CAPACITY);
        let worker = BroadcastLoop {
            frames_rx,
            ctl_rx,
            latest: None,
            viewers: HashMap::new(),
            viewer_queue: viewer_queue.max(1),
        };
        tokio::spawn(worker.run());
        Self { ctl_tx }
    }

    /// Register a viewer. The latest frame, if any, is already queued.
    pub async fn subscribe(&self) -> Result<ViewerSubscription> {
        self.request(|reply| Control::Subscribe { reply }).await
    }

    pub async fn unsubscribe(&self, id: ViewerId) {
        let _ = self.ctl_tx.send(Control::Unsubscribe { id }).await;
    }

    /// Most recently published frame.
    pub async fn latest(&self) -> Result<Option<Arc<Frame>>> {
        self.request(|reply| Control::Latest { reply }).await
    }

    pub async fn viewer_count(&self) -> usize {
        self.request(|reply| Control::ViewerCount { reply })
            .await
            .unwrap_or(0)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Control) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.ctl_tx
            .send(make(reply))
            .await
            .map_err(|_| ImgsrvError::Closed)?;
        rx.await.map_err(|_| ImgsrvError::Closed)
    }
}

struct Snapshot {
    seq: u64,
    frame: Arc<Frame>,
    payload: Arc<str>,
}

struct BroadcastLoop {
    frames_rx: mpsc::Receiver<Delivery>,
    ctl_rx: mpsc::Receiver<Control>,
    latest: Option<Snapshot>,
    viewers: HashMap<ViewerId, mpsc::Sender<Outbound>>,
    viewer_queue: usize,
}

impl BroadcastLoop {
    async fn run(mut self) {
        debug!("broadcaster started");
        let mut frames_open = true;

        loop {
            tokio::select! {
                // Frames first: a frame enqueued before a subscribe request
                // must be the joiner's snapshot, not its second message.
                biased;

                delivery = self.frames_rx.recv(), if frames_open => match delivery {
                    Some(delivery) => self.fan_out(delivery),
                    None => {
                        debug!("frame queue closed; serving snapshot only");
                        frames_open = false;
                    }
                },

                ctl = self.ctl_rx.recv() => match ctl {
                    Some(ctl) => self.handle_control(ctl),
                    None => break,
                },
            }
        }

        debug!(viewers = self.viewers.len(), "broadcaster stopped");
    }

    fn handle_control(&mut self, ctl: Control) {
        match ctl {
            Control::Subscribe { reply } => {
                let sub = self.subscribe();
                if let Err(sub) = reply.send(sub) {
                    // requester went away before we answered
                    self.viewers.remove(&sub.id);
                }
            }
            Control::Unsubscribe { id } => {
                if self.viewers.remove(&id).is_some() {
                    info!(viewer = %id, viewers = self.viewers.len(), "viewer unsubscribed");
                }
            }
            Control::Latest { reply } => {
                let _ = reply.send(self.latest.as_ref().map(|s| Arc::clone(&s.frame)));
            }
            Control::ViewerCount { reply } => {
                let _ = reply.send(self.viewers.len());
            }
        }
    }

    fn subscribe(&mut self) -> ViewerSubscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.viewer_queue);

        if let Some(snap) = &self.latest {
            // fresh queue, cannot be full
            let _ = tx.try_send(Outbound {
                seq: snap.seq,
                payload: Arc::clone(&snap.payload),
                delivered: None,
            });
        }

        self.viewers.insert(id, tx);
        info!(
            viewer = %id,
            viewers = self.viewers.len(),
            snapshot = ?self.latest.as_ref().map(|s| s.seq),
            "viewer subscribed"
        );
        ViewerSubscription { id, rx }
    }

    /// Queue the frame for every viewer without waiting on any of them.
    /// A viewer whose queue is full is dropped; closing its queue ends its
    /// connection.
    fn fan_out(&mut self, delivery: Delivery) {
        let Delivery {
            seq,
            frame,
            payload,
            ack,
        } = delivery;

        let mut confirmations = Vec::new();
        let mut dropped = Vec::new();

        for (id, tx) in &self.viewers {
            let (delivered, confirmation) = if ack.is_some() {
                let (tx, rx) = oneshot::channel();
                (Some(tx), Some(rx))
            } else {
                (None, None)
            };

            let out = Outbound {
                seq,
                payload: Arc::clone(&payload),
                delivered,
            };
            match tx.try_send(out) {
                Ok(()) => confirmations.extend(confirmation),
                Err(TrySendError::Full(_)) => {
                    let err = ImgsrvError::ViewerSendFailed {
                        viewer: id.to_string(),
                        reason: format!("{} frames pending", self.viewer_queue),
                    };
                    warn!(viewer = %id, seq, code = err.code(), "{err}; dropping viewer");
                    dropped.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(viewer = %id, "viewer gone");
                    dropped.push(*id);
                }
            }
        }

        for id in dropped {
            self.viewers.remove(&id);
        }

        debug!(seq, viewers = self.viewers.len(), title = %frame.title, "frame broadcast");
        self.latest = Some(Snapshot {
            seq,
            frame,
            payload,
        });

        if let Some(ack) = ack {
            let viewers = confirmations.len();
            tokio::spawn(async move {
                let delivered = join_all(confirmations)
                    .await
                    .into_iter()
                    .filter(|r| r.is_ok())
                    .count();
                let _ = ack.send(DeliveryReport { viewers, delivered });
            });
        }
    }
}
