//! Request and per-gate statistics for the prediction service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples are trimmed to this many entries
const MAX_SAMPLES: usize = 10_000;

#[derive(Debug, Default)]
struct GateSamples {
    calls: u64,
    survived: u64,
    times_us: Vec<u64>,
}

/// Metrics collector for the prediction service
pub struct ServiceMetrics {
    /// Prediction requests answered with 200
    pub requests_served: AtomicU64,
    /// Prediction requests answered with 500
    pub requests_failed: AtomicU64,
    /// Request processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Per-gate calls, verdicts and inference times
    gates: RwLock<HashMap<String, GateSamples>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            requests_served: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            gates: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a successfully answered request
    pub fn record_request(&self, processing_time: Duration) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }
    }

    /// Record a request that ended in an internal error
    pub fn record_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one gate run and its probability
    pub fn record_gate(&self, gate: &str, duration: Duration, probability: f64) {
        if let Ok(mut gates) = self.gates.write() {
            let samples = gates.entry(gate.to_string()).or_default();
            samples.calls += 1;
            if probability > 0.5 {
                samples.survived += 1;
            }
            samples.times_us.push(duration.as_micros() as u64);
            if samples.times_us.len() > 1000 {
                samples.times_us.drain(0..500);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted.last().copied().unwrap_or(0),
        }
    }

    /// Get per-gate statistics
    pub fn get_gate_stats(&self) -> HashMap<String, GateStats> {
        let Ok(gates) = self.gates.read() else {
            return HashMap::new();
        };

        gates
            .iter()
            .filter(|(_, samples)| !samples.times_us.is_empty())
            .map(|(gate, samples)| {
                let mut sorted = samples.times_us.clone();
                sorted.sort_unstable();
                let count = sorted.len();
                let sum: u64 = sorted.iter().sum();

                (
                    gate.clone(),
                    GateStats {
                        calls: samples.calls,
                        survived: samples.survived,
                        mean_us: sum / count as u64,
                        p50_us: sorted[count / 2],
                        p99_us: sorted[(count as f64 * 0.99) as usize],
                    },
                )
            })
            .collect()
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_served.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let served = self.requests_served.load(Ordering::Relaxed);
        let failed = self.requests_failed.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!(
            served,
            failed,
            throughput = format!("{:.2} req/s", self.get_throughput()),
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            "Prediction service summary"
        );

        let mut gate_stats: Vec<(String, GateStats)> = self.get_gate_stats().into_iter().collect();
        gate_stats.sort_by(|a, b| a.0.cmp(&b.0));
        for (gate, stats) in &gate_stats {
            let survival_rate = stats.survived as f64 / stats.calls.max(1) as f64 * 100.0;
            info!(
                gate = %gate,
                calls = stats.calls,
                survival_rate = format!("{:.1}%", survival_rate),
                mean_us = stats.mean_us,
                p50_us = stats.p50_us,
                p99_us = stats.p99_us,
                "Gate summary"
            );
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Gate-specific statistics
#[derive(Debug)]
pub struct GateStats {
    pub calls: u64,
    /// Calls whose verdict was "survived"
    pub survived: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
