//! Classifier gates and the inference engine

pub mod gate;
pub mod inference;
pub mod loader;
pub mod registry;

pub use gate::{Gate, GateScore};
pub use inference::InferenceEngine;
pub use loader::ModelLoader;
pub use registry::ModelRegistry;
