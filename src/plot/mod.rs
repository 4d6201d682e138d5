//! Plotting: terminal ASCII plots and SVG charts for the web UI.

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::*;
