//! ONNX gate loader

use crate::models::gate::{Gate, GateScore};
use anyhow::{anyhow, Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Gate labels and artifact file names, in load order.
pub const GATE_ARTIFACTS: [(&str, &str); 4] = [
    ("Logistic Gate", "logistic_gate.onnx"),
    ("Random Forest", "random_forest_gate.onnx"),
    ("SVM Gate", "svm_gate.onnx"),
    ("XGBoost Gate", "xgboost_gate.onnx"),
];

/// Which model output carries the score, and how to read it.
#[derive(Debug, Clone, PartialEq)]
enum ScoreOutput {
    /// Class probabilities, tensor `[1, n_classes]` or `seq(map(int64, float))`
    Probability(String),
    /// Decision function values, tensor `[1]`, `[1, 1]` or `[1, 2]`
    Margin(String),
}

/// A classifier gate backed by an ONNX Runtime session
pub struct OnnxGate {
    name: String,
    /// Runs need `&mut Session`; the lock is held for one run only
    session: Mutex<Session>,
    input_name: String,
    output: ScoreOutput,
}

impl OnnxGate {
    fn extract_score(&self, outputs: &ort::session::SessionOutputs) -> Result<GateScore> {
        match &self.output {
            ScoreOutput::Probability(output_name) => {
                let output = outputs
                    .get(output_name.as_str())
                    .ok_or_else(|| anyhow!("{}: missing output '{}'", self.name, output_name))?;
                let dtype = output.dtype();

                // Tensor format (logistic regression, random forest, zipmap disabled)
                if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                    let dims: Vec<i64> = shape.iter().copied().collect();
                    let prob = positive_class_value(&dims, data)
                        .ok_or_else(|| anyhow!("{}: empty probability tensor", self.name))?;
                    return Ok(GateScore::Probability(prob));
                }

                // Sequence format (zipmap enabled) - seq(map(int64, float))
                if DynSequenceValueType::can_downcast(&dtype) {
                    return extract_from_sequence_map(output, &self.name)
                        .map(GateScore::Probability);
                }

                Err(anyhow!(
                    "{}: unsupported probability output type {:?}",
                    self.name,
                    dtype
                ))
            }
            ScoreOutput::Margin(output_name) => {
                let output = outputs
                    .get(output_name.as_str())
                    .ok_or_else(|| anyhow!("{}: missing output '{}'", self.name, output_name))?;
                let (shape, data) = output
                    .try_extract_tensor::<f32>()
                    .with_context(|| format!("{}: decision output is not a float tensor", self.name))?;
                let dims: Vec<i64> = shape.iter().copied().collect();
                let margin = positive_class_value(&dims, data)
                    .ok_or_else(|| anyhow!("{}: empty decision tensor", self.name))?;
                Ok(GateScore::Margin(margin))
            }
        }
    }
}

impl Gate for OnnxGate {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, features: &[f32]) -> Result<GateScore> {
        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor = Tensor::from_array((shape, features.to_vec()))
            .context("Failed to create input tensor")?;

        let mut session = lock_session(&self.session);
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        let score = self.extract_score(&outputs)?;
        debug!(gate = %self.name, score = ?score, "Gate scored");
        Ok(score)
    }
}

/// Take the session lock even if an earlier run panicked.
///
/// Sessions keep no state between runs, so a poisoned guard is still usable.
fn lock_session<T>(session: &Mutex<T>) -> MutexGuard<'_, T> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Choose the output to score from, given the model's output names.
///
/// Any `*prob*` output wins; otherwise the first output that is not a label
/// is read as a decision margin.
fn select_output(names: &[&str]) -> Option<ScoreOutput> {
    names
        .iter()
        .find(|name| name.contains("prob"))
        .map(|name| ScoreOutput::Probability(name.to_string()))
        .or_else(|| {
            names
                .iter()
                .find(|name| !name.contains("label"))
                .map(|name| ScoreOutput::Margin(name.to_string()))
        })
}

/// Pick the positive-class entry from a tensor of shape `[n]` or `[1, n]`.
///
/// Single-column outputs carry the positive class directly.
fn positive_class_value(dims: &[i64], data: &[f32]) -> Option<f64> {
    let width = dims.last().copied().unwrap_or(0);
    if width >= 2 {
        data.get(1).map(|&v| v as f64)
    } else {
        data.first().map(|&v| v as f64)
    }
}

/// Extract the class-1 probability from a seq(map(int64, float)) output
fn extract_from_sequence_map(output: &ort::value::DynValue, gate_name: &str) -> Result<f64> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow!("Failed to downcast to sequence: {}", e))?;

    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    let map_value = maps
        .first()
        .ok_or_else(|| anyhow!("{}: empty probability sequence", gate_name))?;

    let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;

    positive_from_class_map(&kv_pairs)
        .ok_or_else(|| anyhow!("{}: no class probability in map", gate_name))
}

/// Class-1 probability from `(class_id, probability)` pairs, falling back to
/// the complement of class 0
fn positive_from_class_map(pairs: &[(i64, f32)]) -> Option<f64> {
    if let Some((_, prob)) = pairs.iter().find(|(class_id, _)| *class_id == 1) {
        return Some(*prob as f64);
    }
    pairs
        .iter()
        .find(|(class_id, _)| *class_id == 0)
        .map(|(_, prob)| 1.0 - *prob as f64)
}

/// Loader for ONNX gates
pub struct ModelLoader {
    /// Number of intra-op threads per session
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load a single ONNX gate from file
    pub fn load_gate<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<OnnxGate> {
        let path = path.as_ref();

        info!(gate = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_names: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        let output = select_output(&output_names)
            .ok_or_else(|| anyhow!("{} exposes neither probability nor decision output", name))?;

        info!(
            gate = %name,
            input = %input_name,
            output = ?output,
            "Model loaded successfully"
        );

        Ok(OnnxGate {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            output,
        })
    }

    /// Load every known gate from a directory, skipping the ones that fail
    pub fn load_all_gates<P: AsRef<Path>>(&self, models_dir: P) -> Vec<Box<dyn Gate>> {
        let models_dir = models_dir.as_ref();
        let mut gates: Vec<Box<dyn Gate>> = Vec::new();

        for (name, filename) in &GATE_ARTIFACTS {
            let path = models_dir.join(filename);
            if !path.exists() {
                warn!(gate = %name, path = %path.display(), "Model file not found");
                continue;
            }
            match self.load_gate(&path, name) {
                Ok(gate) => gates.push(Box::new(gate)),
                Err(e) => {
                    warn!(gate = %name, error = %e, "Failed to load model, skipping");
                }
            }
        }

        gates
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}
