//! Feature extraction for survival model inference.
//!
//! Builds the positional feature vector the gates were trained on.

use crate::types::passenger::Passenger;

/// Columns fixed for every request (the API does not ask for them)
const SIBSP: f32 = 0.0;
const PARCH: f32 = 0.0;
const EMBARKED_Q: f32 = 0.0;
const EMBARKED_S: f32 = 1.0;

/// Feature extractor that turns a passenger into model input.
///
/// Features are produced in the exact column order used at training time.
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract features from a passenger.
    ///
    /// Order: `[Pclass, Age, SibSp, Parch, Fare, Sex_male, Embarked_Q, Embarked_S]`.
    pub fn extract(&self, passenger: &Passenger) -> Vec<f32> {
        vec![
            passenger.pclass as f32,
            passenger.age as f32,
            SIBSP,
            PARCH,
            passenger.fare as f32,
            passenger.sex_male as f32,
            EMBARKED_Q,
            EMBARKED_S,
        ]
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        8
    }

    /// Get feature names in column order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        vec![
            "Pclass",
            "Age",
            "SibSp",
            "Parch",
            "Fare",
            "Sex_male",
            "Embarked_Q",
            "Embarked_S",
        ]
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}
