use std::io::Cursor;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, ImageFormat};
use imgsrv_core::error::{ImgsrvError, Result};
use imgsrv_core::types::{Frame, FrameKind, FrameSource, PixelGrid};

/// Converts producer input into a transportable [`Frame`]. Pure: no state is
/// kept between calls.
pub trait FrameCodec: Send + Sync {
    fn encode(&self, source: FrameSource) -> Result<Frame>;
}

/// Default codec: grayscale PNG for pixel grids, pass-through for charts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl FrameCodec for PngCodec {
    fn encode(&self, source: FrameSource) -> Result<Frame> {
        let kind = source.kind();
        let (title, png, width, height) = match source {
            FrameSource::Pixels { title, grid } => {
                let (width, height) = (grid.width(), grid.height());
                (title, encode_grid(grid)?, width, height)
            }
            FrameSource::Plot { title, png } => {
                let img = load_png(&png)?;
                let (width, height) = (img.width(), img.height());
                (title, png, width, height)
            }
        };

        let span = tracing::debug_span!("encode_frame", %title, byte_length = png.len()).entered();
        let encoded = STANDARD.encode(&png);
        drop(span);

        Ok(Frame {
            title,
            kind,
            width,
            height,
            png: Arc::from(png),
            encoded,
            encoded_at: chrono::Utc::now(),
        })
    }
}

fn encode_grid(grid: PixelGrid) -> Result<Vec<u8>> {
    let (width, height) = (grid.width(), grid.height());
    let Some(img) = GrayImage::from_raw(width, height, grid.into_bytes()) else {
        return Err(ImgsrvError::EncodeFailed("invalid grayscale buffer".into()));
    };

    let mut png: Vec<u8> = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ImgsrvError::EncodeFailed(e.to_string()))?;
    Ok(png)
}

fn load_png(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| ImgsrvError::EncodeFailed(format!("not a PNG image: {e}")))
}

/// Decode a frame's base64 payload back into a luminance grid.
pub fn decode_frame(frame: &Frame) -> Result<PixelGrid> {
    decode_base64(&frame.encoded)
}

/// Decode a base64 PNG (as pushed to viewers) into a luminance grid.
pub fn decode_base64(encoded: &str) -> Result<PixelGrid> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ImgsrvError::EncodeFailed(format!("invalid base64: {e}")))?;
    let luma = load_png(&bytes)?.to_luma8();
    let (width, height) = luma.dimensions();
    PixelGrid::new(width, height, luma.into_raw())
}
