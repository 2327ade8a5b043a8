use std::sync::Arc;
use std::time::Duration;

use imgsrv_codec::FrameCodec;
use imgsrv_core::error::{ImgsrvError, Result};
use imgsrv_core::types::{Frame, FrameSource};
use imgsrv_protocol::frames::ViewerMessage;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::broadcaster::{Delivery, DeliveryReport};
use crate::state::{Event, PublisherState};

/// Producer requests. The command queue has a single slot, so a producer is
/// at most one frame ahead of the loop.
pub(crate) enum Command {
    Publish {
        source: FrameSource,
        reply: oneshot::Sender<Result<()>>,
    },
    Finish {
        source: FrameSource,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// The publisher's coordination loop. Sole owner of [`PublisherState`] and
/// the only writer of the frame queue.
pub(crate) struct Coordinator {
    pub state: PublisherState,
    pub state_tx: watch::Sender<PublisherState>,
    pub gate_rx: watch::Receiver<bool>,
    pub cmd_rx: mpsc::Receiver<Command>,
    pub frames_tx: mpsc::Sender<Delivery>,
    pub done_tx: watch::Sender<bool>,
    pub codec: Arc<dyn FrameCodec>,
    pub finish_timeout: Duration,
    pub seq: u64,
}

impl Coordinator {
    pub async fn run(mut self) {
        debug!("publisher loop started");
        let mut gate_open = true;

        loop {
            tokio::select! {
                changed = self.gate_rx.changed(), if gate_open => {
                    if changed.is_err() {
                        gate_open = false;
                        continue;
                    }
                    if *self.gate_rx.borrow_and_update() {
                        let _ = self.transition(Event::PageRequested);
                    }
                }

                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Publish { source, reply }) => {
                        let _ = reply.send(self.publish(source).await);
                    }
                    Some(Command::Finish { source, reply }) => {
                        match self.finish(source).await {
                            Ok(ack) => {
                                // the final frame is consumed; release the producer
                                // before waiting on the viewers
                                let _ = reply.send(Ok(()));
                                self.await_ack(ack).await;
                                break;
                            }
                            Err(e) => {
                                let closed = self.state == PublisherState::Closed;
                                let _ = reply.send(Err(e));
                                if closed {
                                    break;
                                }
                            }
                        }
                    }
                    None => break,
                },
            }
        }

        if self.state != PublisherState::Closed {
            self.state = PublisherState::Closed;
            self.state_tx.send_replace(PublisherState::Closed);
        }
        let _ = self.done_tx.send(true);
        debug!(frames = self.seq, "publisher loop stopped");
    }

    async fn publish(&mut self, source: FrameSource) -> Result<()> {
        self.transition(Event::Publish)?;
        let result = match self.encode(source).await {
            Ok(frame) => self.enqueue(frame, None).await,
            Err(e) => Err(e),
        };
        self.transition(Event::Delivered)?;
        result
    }

    /// Encode first so a codec failure leaves the session open for a retry.
    async fn finish(&mut self, source: FrameSource) -> Result<oneshot::Receiver<DeliveryReport>> {
        self.state.apply(Event::Finish)?;
        let frame = self.encode(source).await?;
        self.transition(Event::Finish)?;

        let (ack_tx, ack_rx) = oneshot::channel();
        self.enqueue(frame, Some(ack_tx)).await?;
        Ok(ack_rx)
    }

    async fn encode(&self, source: FrameSource) -> Result<Frame> {
        let codec = Arc::clone(&self.codec);
        let title = source.title().to_string();
        let result = tokio::task::spawn_blocking(move || codec.encode(source))
            .await
            .map_err(|e| ImgsrvError::EncodeFailed(format!("encoder task failed: {e}")))?;

        if let Err(ref e) = result {
            warn!(%title, code = e.code(), "frame encoding failed: {e}");
        }
        result
    }

    async fn enqueue(
        &mut self,
        frame: Frame,
        ack: Option<oneshot::Sender<DeliveryReport>>,
    ) -> Result<()> {
        let payload: Arc<str> = ViewerMessage::from_frame(&frame).to_json()?.into();
        self.seq += 1;
        debug!(seq = self.seq, %frame, "frame accepted");

        let delivery = Delivery {
            seq: self.seq,
            frame: Arc::new(frame),
            payload,
            ack,
        };
        self.frames_tx
            .send(delivery)
            .await
            .map_err(|_| ImgsrvError::Closed)
    }

    async fn await_ack(&self, ack: oneshot::Receiver<DeliveryReport>) {
        match tokio::time::timeout(self.finish_timeout, ack).await {
            Ok(Ok(report)) => info!(
                viewers = report.viewers,
                delivered = report.delivered,
                "final frame delivered"
            ),
            Ok(Err(_)) => warn!("broadcaster stopped before acknowledging the final frame"),
            Err(_) => warn!(
                timeout_ms = self.finish_timeout.as_millis() as u64,
                "final frame not acknowledged in time"
            ),
        }
    }

    fn transition(&mut self, event: Event) -> Result<PublisherState> {
        let next = self.state.apply(event)?;
        if next != self.state {
            debug!(from = %self.state, to = %next, event = event.as_str(), "publisher transition");
            if next == PublisherState::Armed && self.state == PublisherState::Idle {
                info!("viewer present; publisher armed");
            }
            self.state = next;
            self.state_tx.send_replace(next);
        }
        Ok(next)
    }
}
