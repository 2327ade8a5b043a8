use std::fmt;

use imgsrv_core::error::{ImgsrvError, Result};

/// Publisher lifecycle. Held by the coordination loop, mirrored to every
/// session handle through a watch channel.
///
/// ```text
/// Idle --PageRequested--> Armed --Publish--> Delivering --Delivered--> Armed
/// Armed | Delivering --Finish--> Closed
/// ```
///
/// No transition leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublisherState {
    /// No viewer has requested the page yet.
    Idle,
    /// A viewer is (or was) present; frames are accepted.
    Armed,
    /// A frame is being encoded and handed to the broadcaster.
    Delivering,
    /// `finish` accepted; terminal.
    Closed,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    PageRequested,
    Publish,
    Delivered,
    Finish,
}

impl PublisherState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublisherState::Idle => "idle",
            PublisherState::Armed => "armed",
            PublisherState::Delivering => "delivering",
            PublisherState::Closed => "closed",
        }
    }

    /// Guarded transition. Page requests are idempotent; everything else on
    /// `Closed` fails with [`ImgsrvError::Closed`].
    pub fn apply(self, event: Event) -> Result<PublisherState> {
        use Event::*;
        use PublisherState::*;

        match (self, event) {
            (Idle, PageRequested) => Ok(Armed),
            (state, PageRequested) => Ok(state),
            (Closed, _) => Err(ImgsrvError::Closed),
            (Armed, Publish) => Ok(Delivering),
            (Delivering, Delivered) => Ok(Armed),
            (Armed | Delivering, Finish) => Ok(Closed),
            (from, event) => Err(ImgsrvError::InvalidTransition {
                from: from.as_str(),
                event: event.as_str(),
            }),
        }
    }

    /// True once the rendezvous gate has opened (including after close).
    pub fn viewer_seen(&self) -> bool {
        !matches!(self, PublisherState::Idle)
    }
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::PageRequested => "page-requested",
            Event::Publish => "publish",
            Event::Delivered => "delivered",
            Event::Finish => "finish",
        }
    }
}

impl fmt::Display for PublisherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
