//! `imgsrv-gateway`: HTTP side of an imgsrv session.
//!
//! | Path | Description |
//! |------|-------------|
//! | `/` | Viewer page; serving it arms the publisher's rendezvous gate |
//! | `/data` | WebSocket push connection, one per viewer |
//! | `/health` | Liveness probe with publisher state and viewer count |

pub mod app;
pub mod http;
pub mod net;
pub mod server;
pub mod ws;

pub use server::{serve, start, ServerHandle};
