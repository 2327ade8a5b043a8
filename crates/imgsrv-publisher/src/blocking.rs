use std::path::Path;

use imgsrv_core::error::Result;
use imgsrv_core::types::PixelGrid;
use tokio::runtime::Handle;

use crate::session::Session;

/// Synchronous face of a [`Session`] for simulation loops running on their
/// own threads.
///
/// Every method blocks the calling thread on the runtime, so none of them may
/// be called from inside an async task.
#[derive(Clone)]
pub struct BlockingSession {
    session: Session,
    handle: Handle,
}

impl BlockingSession {
    pub fn new(session: Session, handle: Handle) -> Self {
        Self { session, handle }
    }

    pub fn publish(&self, title: impl Into<String>, pixels: PixelGrid) -> Result<()> {
        self.handle.block_on(self.session.publish(title, pixels))
    }

    pub fn publish_plot(&self, title: impl Into<String>, png: Vec<u8>) -> Result<()> {
        self.handle.block_on(self.session.publish_plot(title, png))
    }

    pub fn finish(&self, title: impl Into<String>, pixels: PixelGrid) -> Result<()> {
        self.handle.block_on(self.session.finish(title, pixels))
    }

    pub fn finish_plot(&self, title: impl Into<String>, png: Vec<u8>) -> Result<()> {
        self.handle.block_on(self.session.finish_plot(title, png))
    }

    pub fn wait(&self) {
        self.handle.block_on(self.session.wait())
    }

    pub fn print(&self, path: impl AsRef<Path>) -> Result<()> {
        self.handle.block_on(self.session.print(path))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}
