//! Card shop and prize draw

pub mod catalog;
pub mod engine;

pub use engine::{EconomyEngine, Purchase, ScratchOutcome};
