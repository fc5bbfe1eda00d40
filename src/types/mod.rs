//! Type definitions for the prediction service

pub mod passenger;
pub mod prediction;

pub use passenger::{FeatureError, Passenger};
pub use prediction::{GateResult, PredictionResponse};
