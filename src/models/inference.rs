//! Multi-gate inference engine for survival prediction

use crate::feature_extractor::FeatureExtractor;
use crate::metrics::ServiceMetrics;
use crate::models::registry::ModelRegistry;
use crate::types::passenger::Passenger;
use crate::types::prediction::{GateResult, PredictionResponse};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Runs every registered gate on the same passenger.
///
/// Holds no per-request state: identical payloads against the same registry
/// always produce identical responses.
pub struct InferenceEngine {
    registry: ModelRegistry,
    extractor: FeatureExtractor,
    metrics: Option<Arc<ServiceMetrics>>,
}

impl InferenceEngine {
    /// Create an inference engine over a loaded registry
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            extractor: FeatureExtractor::new(),
            metrics: None,
        }
    }

    /// Record per-gate latency and verdicts into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<ServiceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Get the number of loaded gates
    pub fn gate_count(&self) -> usize {
        self.registry.len()
    }

    /// Get loaded gate names, in load order
    pub fn gate_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Column names of the feature vector every gate receives
    pub fn feature_names(&self) -> Vec<&'static str> {
        self.extractor.feature_names()
    }

    /// Decode a raw payload and run every gate on it.
    pub fn predict_payload(&self, payload: &Map<String, Value>) -> Result<PredictionResponse> {
        let passenger = Passenger::from_payload(payload)?;
        self.predict(&passenger)
    }

    /// Run every gate on a passenger.
    ///
    /// The first gate failure aborts the whole prediction.
    pub fn predict(&self, passenger: &Passenger) -> Result<PredictionResponse> {
        let features = self.extractor.extract(passenger);
        let mut results = Vec::with_capacity(self.registry.len());

        for gate in self.registry.iter() {
            let start = Instant::now();
            let score = gate
                .score(&features)
                .with_context(|| format!("{} inference failed", gate.name()))?;
            let probability = score
                .checked_probability()
                .with_context(|| format!("{} returned an invalid score", gate.name()))?;

            if let Some(metrics) = &self.metrics {
                metrics.record_gate(gate.name(), start.elapsed(), probability);
            }

            results.push(GateResult::from_probability(gate.name(), probability));
        }

        debug!(
            passenger = ?passenger,
            results = ?results,
            "Inference complete"
        );

        Ok(PredictionResponse { results })
    }
}
