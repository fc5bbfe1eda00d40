//! Lifeboat Gates
//!
//! Survival-probability inference over a small ensemble of independently
//! trained classifiers ("gates"), served over HTTP. Every gate sees the same
//! feature vector and reports its own verdict; nothing is aggregated.

pub mod api;
pub mod config;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod types;

pub use config::AppConfig;
pub use feature_extractor::FeatureExtractor;
pub use models::inference::InferenceEngine;
pub use models::registry::ModelRegistry;
pub use types::{passenger::Passenger, prediction::GateResult};
