//! `imgsrv-codec`: turns producer input into transportable frames.
//!
//! Pixel grids are rendered as 8-bit grayscale PNGs; pre-rendered charts are
//! validated and passed through. Either way the result is a [`Frame`] holding
//! the PNG bytes and their base64 text.
//!
//! [`Frame`]: imgsrv_core::types::Frame

pub mod dump;
pub mod png;

pub use dump::write_png;
pub use png::{decode_frame, FrameCodec, PngCodec};
