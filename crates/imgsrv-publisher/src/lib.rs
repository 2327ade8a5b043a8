//! `imgsrv-publisher`: rendezvous-and-broadcast coordination.
//!
//! # Overview
//!
//! A [`Session`] owns two background tasks:
//!
//! | Task | Role |
//! |------|------|
//! | coordination loop | Holds the [`PublisherState`] machine, encodes frames, feeds the broadcaster |
//! | broadcaster | Keeps the latest frame, fans every frame out to per-viewer queues |
//!
//! The first `publish` blocks until a viewer has requested the page
//! ([`Session::arm`]); later publishes go straight through. `finish` sends a
//! last frame, waits for the broadcaster to confirm delivery (bounded by a
//! timeout) and closes the session for good.

pub mod blocking;
pub mod broadcaster;
mod coordinator;
pub mod session;
pub mod state;

pub use blocking::BlockingSession;
pub use broadcaster::{Broadcaster, DeliveryReport, Outbound, ViewerId, ViewerSubscription};
pub use session::Session;
pub use state::{Event, PublisherState};
