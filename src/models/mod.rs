//! First-order step response model.
//!
//! The model is implemented as small, pure functions so that fitting/search code can
//! stay simple.

pub mod model;

pub use model::*;
