pub mod config;
pub mod error;
pub mod types;

pub use config::ImgsrvConfig;
pub use error::{ImgsrvError, Result};
pub use types::{Frame, FrameKind, FrameSource, PixelGrid};
