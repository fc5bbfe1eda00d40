//! Per-gate prediction results returned to callers

use serde::{Deserialize, Serialize};

/// Survival threshold applied to the raw probability
pub const SURVIVAL_THRESHOLD: f64 = 0.5;

/// One gate's verdict for a passenger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    /// Gate label
    pub name: String,
    /// Survival probability as a percentage, one decimal place
    pub prob: f64,
    /// `true` when the raw probability is strictly above 0.5
    pub survived: bool,
}

impl GateResult {
    /// Build a result from a raw 0-1 probability
    pub fn from_probability(name: impl Into<String>, probability: f64) -> Self {
        Self {
            name: name.into(),
            prob: to_percent(probability),
            survived: probability > SURVIVAL_THRESHOLD,
        }
    }
}

/// Response body of the prediction endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub results: Vec<GateResult>,
}

/// Probability → percentage rounded to one decimal.
///
/// Rounds the exact binary value, so exact ties go to even (6.25 → 6.2).
pub fn to_percent(probability: f64) -> f64 {
    let percent = probability * 100.0;
    format!("{:.1}", percent).parse().unwrap_or(percent)
}
