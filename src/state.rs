//! # Application State Management
//!
//! Shared state accessed by every HTTP handler and every call session:
//! the current configuration, the server start time, and the metrics the
//! health endpoints report. Everything mutable sits behind `Arc<RwLock<..>>`
//! so request handlers and relay sessions can update it concurrently.

use crate::config::AppConfig;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// State shared across all HTTP request handlers and call sessions.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<RwLock<AppConfig>>,

    /// Counters reported by the health/metrics endpoints
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,
}

/// Counters collected across HTTP requests and call sessions.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of failed HTTP requests since server start
    pub error_count: u64,

    /// Call sessions currently in flight
    pub active_calls: u32,

    /// Call sessions that have completed teardown
    pub calls_handled: u64,

    /// Non-empty inbound audio frames persisted across all calls
    pub frames_recorded: u64,

    /// Inbound audio bytes persisted across all calls
    pub bytes_recorded: u64,

    /// Outbound payload transmissions across all calls
    pub payload_transmissions: u64,

    /// Per-endpoint statistics, keyed by "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Statistics for one HTTP endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the lock immediately; `AppConfig` is cheap to clone.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    /// Record one finished HTTP request against its endpoint.
    ///
    /// Errors are counted both per-endpoint and in the global error counter.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
            metrics.error_count += 1;
        }
    }

    /// A call session has been accepted and is now racing its two tasks.
    pub fn call_started(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.active_calls += 1;
    }

    /// A call session has finished teardown; fold its totals in.
    pub fn call_finished(&self, frames: u64, bytes: u64, transmissions: u64) {
        let mut metrics = self.metrics.write().unwrap();
        if metrics.active_calls > 0 {
            metrics.active_calls -= 1;
        }
        metrics.calls_handled += 1;
        metrics.frames_recorded += frames;
        metrics.bytes_recorded += bytes;
        metrics.payload_transmissions += transmissions;
    }

    /// Snapshot the metrics without holding the lock during serialization.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            active_calls: metrics.active_calls,
            calls_handled: metrics.calls_handled,
            frames_recorded: metrics.frames_recorded,
            bytes_recorded: metrics.bytes_recorded,
            payload_transmissions: metrics.payload_transmissions,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_lifecycle_updates_counters() {
        let state = AppState::new(AppConfig::default());

        state.call_started();
        state.call_started();
        assert_eq!(state.get_metrics_snapshot().active_calls, 2);

        state.call_finished(3, 60, 1);
        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.active_calls, 1);
        assert_eq!(snapshot.calls_handled, 1);
        assert_eq!(snapshot.frames_recorded, 3);
        assert_eq!(snapshot.bytes_recorded, 60);
        assert_eq!(snapshot.payload_transmissions, 1);
    }

    #[test]
    fn call_finished_never_underflows() {
        let state = AppState::new(AppConfig::default());
        state.call_finished(0, 0, 0);
        assert_eq!(state.get_metrics_snapshot().active_calls, 0);
        assert_eq!(state.get_metrics_snapshot().calls_handled, 1);
    }

    #[test]
    fn endpoint_metrics_accumulate() {
        let state = AppState::new(AppConfig::default());
        state.record_endpoint_request("POST /analyze", 100, false);
        state.record_endpoint_request("POST /analyze", 300, true);

        let snapshot = state.get_metrics_snapshot();
        let metric = snapshot.endpoint_metrics.get("POST /analyze").unwrap();
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.average_duration_ms(), 200.0);
        assert_eq!(metric.error_rate(), 0.5);
        assert_eq!(snapshot.error_count, 1);
    }
}
