use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{ImgsrvError, Result};

/// Which producer path a frame came from. Decides the wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// Raw pixel grid, pushed as `{ "title", "image" }`.
    Image,
    /// Pre-rendered chart, pushed as `{ "plot" }`.
    Plot,
}

/// One encoded image plus metadata. Immutable once built; shared as `Arc<Frame>`.
#[derive(Debug, Clone)]
pub struct Frame {
    pub title: String,
    pub kind: FrameKind,
    pub width: u32,
    pub height: u32,
    /// Raw PNG bytes, kept for the file dump path.
    pub png: Arc<[u8]>,
    /// Standard base64 of `png`, what viewers receive.
    pub encoded: String,
    pub encoded_at: DateTime<Utc>,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} frame {:?} ({}x{}, {} bytes)",
            self.kind,
            self.title,
            self.width,
            self.height,
            self.png.len()
        )
    }
}

/// Rectangular grid of 8-bit luminance values, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelGrid {
    /// Build from a flat row-major buffer of exactly `width * height` bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ImgsrvError::EncodeFailed(format!(
                "empty pixel grid ({}x{})",
                width, height
            )));
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(ImgsrvError::EncodeFailed(format!(
                "pixel buffer holds {} bytes, {}x{} needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build from rows; every row must have the same non-zero length.
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if let Some((y, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(ImgsrvError::EncodeFailed(format!(
                "ragged pixel grid: row {} has {} columns, expected {}",
                y,
                row.len(),
                width
            )));
        }
        let height = rows.len();
        let width = u32::try_from(width)
            .map_err(|_| ImgsrvError::EncodeFailed("pixel grid too wide".to_string()))?;
        let height = u32::try_from(height)
            .map_err(|_| ImgsrvError::EncodeFailed("pixel grid too tall".to_string()))?;
        Self::new(width, height, rows.into_iter().flatten().collect())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

/// What a producer hands to the Publisher before encoding.
#[derive(Debug, Clone)]
pub enum FrameSource {
    Pixels { title: String, grid: PixelGrid },
    /// An already-rendered chart as PNG bytes.
    Plot { title: String, png: Vec<u8> },
}

impl FrameSource {
    pub fn title(&self) -> &str {
        match self {
            FrameSource::Pixels { title, .. } | FrameSource::Plot { title, .. } => title,
        }
    }

    pub fn kind(&self) -> FrameKind {
        match self {
            FrameSource::Pixels { .. } => FrameKind::Image,
            FrameSource::Plot { .. } => FrameKind::Plot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_from_rows() {
        let grid = PixelGrid::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.get(2, 1), Some(6));
        assert_eq!(grid.get(3, 0), None);
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = PixelGrid::from_rows(vec![vec![1, 2, 3], vec![4, 5]]).unwrap_err();
        assert!(matches!(err, ImgsrvError::EncodeFailed(_)));
    }

    #[test]
    fn empty_grid_rejected() {
        assert!(PixelGrid::from_rows(Vec::new()).is_err());
        assert!(PixelGrid::from_rows(vec![Vec::new()]).is_err());
        assert!(PixelGrid::new(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn flat_buffer_length_checked() {
        assert!(PixelGrid::new(2, 2, vec![0; 3]).is_err());
        assert!(PixelGrid::new(2, 2, vec![0; 4]).is_ok());
    }

    #[test]
    fn source_kind_follows_variant() {
        let grid = PixelGrid::new(1, 1, vec![0]).unwrap();
        let src = FrameSource::Pixels {
            title: "t".into(),
            grid,
        };
        assert_eq!(src.kind(), FrameKind::Image);
        assert_eq!(src.title(), "t");
    }
}
