use imgsrv_core::error::Result;
use imgsrv_core::types::PixelGrid;
use imgsrv_publisher::BlockingSession;
use std::time::Duration;
use tracing::{debug, info};

/// Explicit finite-difference heat equation on a plate with cold edges.
pub struct Diffusion {
    width: usize,
    height: usize,
    cells: Vec<f32>,
}

const ALPHA: f32 = 0.2; // stable for alpha <= 0.25

impl Diffusion {
    /// Plate at zero with a hot square in the middle.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (width as usize, height as usize);
        let mut cells = vec![0.0; width * height];
        let (cx, cy) = (width / 2, height / 2);
        let r = (width.min(height) / 8).max(1);
        for y in cy.saturating_sub(r)..(cy + r).min(height) {
            for x in cx.saturating_sub(r)..(cx + r).min(width) {
                cells[y * width + x] = 1.0;
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn step(&mut self) {
        let (w, h) = (self.width, self.height);
        let mut next = self.cells.clone();
        for y in 1..h.saturating_sub(1) {
            for x in 1..w.saturating_sub(1) {
                let i = y * w + x;
                let lap = self.cells[i - 1] + self.cells[i + 1] + self.cells[i - w] + self.cells[i + w]
                    - 4.0 * self.cells[i];
                next[i] = self.cells[i] + ALPHA * lap;
            }
        }
        self.cells = next;
    }

    pub fn total_heat(&self) -> f32 {
        self.cells.iter().sum()
    }

    /// Grayscale rendering, normalized to the current peak temperature.
    pub fn render(&self) -> Result<PixelGrid> {
        let peak = self.cells.iter().cloned().fold(0.0f32, f32::max);
        let scale = if peak > 0.0 { 255.0 / peak } else { 0.0 };
        let data = self
            .cells
            .iter()
            .map(|t| (t * scale).round().clamp(0.0, 255.0) as u8)
            .collect();
        PixelGrid::new(self.width as u32, self.height as u32, data)
    }
}

pub struct DemoOptions {
    pub frames: usize,
    pub width: u32,
    pub height: u32,
    pub interval: Duration,
}

/// Publish every simulation step, then the last one as the final frame.
pub fn run(session: &BlockingSession, opts: &DemoOptions) -> Result<()> {
    let mut sim = Diffusion::new(opts.width, opts.height);
    let total = opts.frames.max(1);

    for i in 1..total {
        sim.step();
        session.publish(format!("step {i}/{total}"), sim.render()?)?;
        debug!(step = i, heat = sim.total_heat(), "step published");
        std::thread::sleep(opts.interval);
    }

    sim.step();
    session.finish(format!("step {total}/{total}"), sim.render()?)?;
    info!(frames = total, "simulation finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_hot_center() {
        let sim = Diffusion::new(16, 16);
        let grid = sim.render().unwrap();
        assert_eq!(grid.get(8, 8), Some(255));
        assert_eq!(grid.get(0, 0), Some(0));
    }

    #[test]
    fn heat_spreads_and_never_grows() {
        let mut sim = Diffusion::new(16, 16);
        let before = sim.total_heat();
        let edge_before = sim.cells[8 * 16 + 4];
        for _ in 0..10 {
            sim.step();
        }
        assert!(sim.total_heat() <= before + 1e-3);
        assert!(sim.cells[8 * 16 + 4] > edge_before);
    }

    #[test]
    fn render_matches_dimensions() {
        let grid = Diffusion::new(7, 3).render().unwrap();
        assert_eq!((grid.width(), grid.height()), (7, 3));
    }

    #[test]
    fn empty_plate_is_rejected() {
        assert!(Diffusion::new(0, 4).render().is_err());
    }
}
