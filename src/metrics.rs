//! Remote provider call metrics
//!
//! Keeps a rolling window of call latencies and lifetime success counters for
//! the `/health` report.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for percentile calculation
const MAX_SAMPLES: usize = 100;

/// Snapshot of provider call metrics
#[derive(Debug, Clone, Serialize)]
pub struct ProviderMetrics {
    pub provider_name: String,
    pub latency_p50_ms: f64,
    pub latency_p99_ms: f64,
    /// Success rate over the rolling window (0.0 to 1.0)
    pub recent_success_rate: f64,
    pub total_requests: u64,
    pub failed_requests: u64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    duration_ms: f64,
    success: bool,
}

#[derive(Default)]
struct MetricsState {
    samples: VecDeque<Sample>,
    total_requests: u64,
    failed_requests: u64,
}

/// Collects call outcomes for one provider
pub struct MetricsCollector {
    provider_name: String,
    state: RwLock<MetricsState>,
}

impl MetricsCollector {
    pub fn new(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            state: RwLock::new(MetricsState {
                samples: VecDeque::with_capacity(MAX_SAMPLES),
                ..MetricsState::default()
            }),
        }
    }

    /// Records one logical call (all retry attempts included)
    pub async fn record_request(&self, duration: Duration, success: bool) {
        let mut state = self.state.write().await;
        state.total_requests += 1;
        if !success {
            state.failed_requests += 1;
        }
        if state.samples.len() >= MAX_SAMPLES {
            state.samples.pop_front();
        }
        state.samples.push_back(Sample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
        });
    }

    pub async fn get_metrics(&self) -> ProviderMetrics {
        let state = self.state.read().await;

        // Percentiles only over calls that actually returned data
        let mut latencies: Vec<f64> = state
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();
        latencies.sort_by(|a, b| a.total_cmp(b));

        let recent_success_rate = if state.samples.is_empty() {
            1.0
        } else {
            latencies.len() as f64 / state.samples.len() as f64
        };

        ProviderMetrics {
            provider_name: self.provider_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            recent_success_rate,
            total_requests: state.total_requests,
            failed_requests: state.failed_requests,
        }
    }
}

/// Nearest-rank percentile of already sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
