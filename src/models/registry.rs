//! In-memory registry of loaded gates

use crate::models::gate::Gate;
use crate::models::loader::ModelLoader;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Read-only collection of gates, in load order.
///
/// Built once at startup and shared by every request.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    gates: Arc<Vec<Box<dyn Gate>>>,
}

impl ModelRegistry {
    /// Load all known gates from `models_dir`.
    ///
    /// Never fails: gates that are missing or do not deserialize are logged
    /// and left out, so the result holds zero to four gates.
    pub fn load<P: AsRef<Path>>(models_dir: P, onnx_threads: usize) -> Self {
        let models_dir = models_dir.as_ref();

        let loader = match ModelLoader::with_threads(onnx_threads) {
            Ok(loader) => loader,
            Err(e) => {
                warn!(error = %e, "ONNX Runtime unavailable, no gates loaded");
                return Self::default();
            }
        };

        let registry = Self::from_gates(loader.load_all_gates(models_dir));

        if registry.is_empty() {
            warn!(models_dir = %models_dir.display(), "No gates loaded");
        } else {
            info!(
                count = registry.len(),
                "Loaded {} gates from {}",
                registry.len(),
                models_dir.display()
            );
        }

        registry
    }

    /// Build a registry from already constructed gates
    pub fn from_gates(gates: Vec<Box<dyn Gate>>) -> Self {
        Self {
            gates: Arc::new(gates),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Gate> {
        self.gates.iter().map(|g| g.as_ref())
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Gate labels in load order
    pub fn names(&self) -> Vec<String> {
        self.iter().map(|g| g.name().to_string()).collect()
    }
}
