//! Terminal UI pieces plugged into the acquisition controller.

pub mod progress;
pub mod prompt;
