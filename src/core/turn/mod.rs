//! Turn detection and the reply pipeline.

mod engine;
pub mod prompts;

pub use engine::TurnEngine;
