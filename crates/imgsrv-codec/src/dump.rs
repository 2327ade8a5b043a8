use std::fs::File;
use std::io::Write;
use std::path::Path;

use imgsrv_core::error::Result;
use imgsrv_core::types::Frame;
use tracing::info;

/// Write a frame's PNG to `path`, replacing any existing file.
///
/// The frame already holds encoded PNG bytes, so nothing is re-encoded.
/// Errors are returned to the caller and never touch the live session.
pub fn write_png(frame: &Frame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)?;
    file.write_all(&frame.png)?;
    // surface write-back errors here rather than on drop
    file.sync_all()?;
    info!(path = %path.display(), title = %frame.title, bytes = frame.png.len(), "frame written to disk");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::png::{FrameCodec, PngCodec};
    use imgsrv_core::types::{FrameSource, PixelGrid};

    fn frame() -> Frame {
        PngCodec
            .encode(FrameSource::Pixels {
                title: "dump".into(),
                grid: PixelGrid::new(3, 2, vec![10, 20, 30, 40, 50, 60]).unwrap(),
            })
            .unwrap()
    }

    #[test]
    fn written_file_is_decodable_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");

        write_png(&frame(), &path).unwrap();

        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/out.png");

        let err = write_png(&frame(), &path).unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
    }
}
