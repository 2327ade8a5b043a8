pub mod frames;

pub use frames::{ImageMessage, PlotMessage, ViewerMessage};
