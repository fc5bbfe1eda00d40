//! The classifier seam: anything that can score a feature vector.

use anyhow::{bail, Result};

/// Raw output of a single gate for one feature vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateScore {
    /// Positive-class membership probability (0.0 - 1.0)
    Probability(f64),
    /// Unbounded decision margin, positive means "survived"
    Margin(f64),
}

impl GateScore {
    /// Normalize the score into a probability.
    ///
    /// Margins are mapped through the logistic function.
    pub fn probability(self) -> f64 {
        match self {
            GateScore::Probability(p) => p,
            GateScore::Margin(m) => sigmoid(m),
        }
    }

    /// Like [`GateScore::probability`], but rejects values that cannot be a
    /// probability.
    ///
    /// A "probability" output outside `[0, 1]` usually means the model was
    /// exported without calibration and its output holds decision scores.
    pub fn checked_probability(self) -> Result<f64> {
        let p = self.probability();
        if !(0.0..=1.0).contains(&p) {
            match self {
                GateScore::Probability(raw) => bail!(
                    "probability output {} is outside [0, 1]; export decision scores under a non-probability output name",
                    raw
                ),
                GateScore::Margin(raw) => bail!("decision margin {} is not a number", raw),
            }
        }
        Ok(p)
    }
}

/// Logistic transform `1 / (1 + e^-x)`.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// A loaded, immutable classifier.
///
/// Implementations must be safe to call from many requests at once.
pub trait Gate: Send + Sync {
    /// Human-readable label, e.g. "Random Forest"
    fn name(&self) -> &str;

    /// Score a single feature vector
    fn score(&self, features: &[f32]) -> Result<GateScore>;
}
