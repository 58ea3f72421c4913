//! Metrics & Alerts.
//!
//! Per-series ring buffers behind a `parking_lot::Mutex`, updated without
//! ever holding the lock across an await. A plain mutex is used instead of
//! atomics since percentile computation needs the whole buffer anyway, but
//! the guard never crosses a suspension point.

use std::collections::{HashMap, VecDeque};

use gateway_types::{now_ms, Alert, AlertSeverity, HostUsage, SeriesStats, TimestampMs};
use parking_lot::Mutex;

const DEFAULT_WINDOW_MS: u64 = 60 * 60_000;
const ALERT_DEDUP_WINDOW_MS: u64 = 60_000;
const ANOMALY_K: f64 = 2.5;

struct Series {
    points: Mutex<VecDeque<(TimestampMs, f64)>>,
    window_ms: u64,
}

impl Series {
    fn new(window_ms: u64) -> Self {
        Self {
            points: Mutex::new(VecDeque::new()),
            window_ms,
        }
    }

    fn record(&self, value: f64, at: TimestampMs) {
        let mut points = self.points.lock();
        points.push_back((at, value));
        let cutoff = at.saturating_sub(self.window_ms);
        while points.front().is_some_and(|(t, _)| *t < cutoff) {
            points.pop_front();
        }
    }

    fn stats(&self) -> SeriesStats {
        let points = self.points.lock();
        if points.is_empty() {
            return SeriesStats::default();
        }
        let mut values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let count = values.len();
        let sum: f64 = values.iter().sum();
        let mean = sum / count as f64;
        let percentile = |p: f64| -> f64 {
            let idx = ((count as f64 - 1.0) * p).round() as usize;
            values[idx.min(count - 1)]
        };
        SeriesStats {
            count,
            min: values[0],
            max: values[count - 1],
            mean,
            p50: percentile(0.50),
            p95: percentile(0.95),
            p99: percentile(0.99),
        }
    }

    fn mean_and_stddev(&self) -> Option<(f64, f64)> {
        let points = self.points.lock();
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f64;
        let mean = points.iter().map(|(_, v)| v).sum::<f64>() / n;
        let variance = points.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>() / n;
        Some((mean, variance.sqrt()))
    }

    fn last_value(&self) -> Option<f64> {
        self.points.lock().back().map(|(_, v)| *v)
    }

    /// Simple linear slope over the stored samples, used by the Scaler's
    /// trend detection.
    fn slope(&self) -> f64 {
        let points = self.points.lock();
        let n = points.len();
        if n < 2 {
            return 0.0;
        }
        let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let ys: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
        let x_mean = xs.iter().sum::<f64>() / n as f64;
        let y_mean = ys.iter().sum::<f64>() / n as f64;
        let mut num = 0.0;
        let mut den = 0.0;
        for i in 0..n {
            num += (xs[i] - x_mean) * (ys[i] - y_mean);
            den += (xs[i] - x_mean).powi(2);
        }
        if den == 0.0 {
            0.0
        } else {
            num / den
        }
    }
}

pub const ACQUIRE_LATENCY: &str = "acquire_latency";
pub const RELEASE_LATENCY: &str = "release_latency";
pub const QUEUE_LENGTH: &str = "queue_length";
pub const QUEUE_WAIT_TIME: &str = "queue_wait_time";
pub const POOL_SIZE: &str = "pool_size";
pub const ACTIVE_COUNT: &str = "active_count";
pub const UTILIZATION_PERCENT: &str = "utilization_percent";
pub const ERROR_RATE: &str = "error_rate";
pub const PAGE_CREATION_TIME: &str = "page_creation_time";
pub const HEALTH_CHECK_DURATION: &str = "health_check_duration";
pub const HOST_CPU_PERCENT: &str = "host_cpu_percent";
pub const HOST_MEMORY_PERCENT: &str = "host_memory_percent";

const ALL_SERIES: &[&str] = &[
    ACQUIRE_LATENCY,
    RELEASE_LATENCY,
    QUEUE_LENGTH,
    QUEUE_WAIT_TIME,
    POOL_SIZE,
    ACTIVE_COUNT,
    UTILIZATION_PERCENT,
    ERROR_RATE,
    PAGE_CREATION_TIME,
    HEALTH_CHECK_DURATION,
    HOST_CPU_PERCENT,
    HOST_MEMORY_PERCENT,
];

/// Thresholds that turn a recorded value into a deduplicated `Alert`.
#[derive(Debug, Clone, Copy)]
pub struct AlertThreshold {
    pub warning: f64,
    pub critical: f64,
}

pub struct MetricsRegistry {
    series: HashMap<&'static str, Series>,
    last_alert_at: Mutex<HashMap<(&'static str, AlertSeverity), TimestampMs>>,
    pub host: Mutex<HostUsage>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut series = HashMap::new();
        for name in ALL_SERIES {
            series.insert(*name, Series::new(DEFAULT_WINDOW_MS));
        }
        Self {
            series,
            last_alert_at: Mutex::new(HashMap::new()),
            host: Mutex::new(HostUsage::default()),
        }
    }

    pub fn record(&self, name: &'static str, value: f64) {
        if let Some(series) = self.series.get(name) {
            series.record(value, now_ms());
        }
    }

    pub fn stats(&self, name: &'static str) -> SeriesStats {
        self.series.get(name).map(Series::stats).unwrap_or_default()
    }

    pub fn last(&self, name: &'static str) -> Option<f64> {
        self.series.get(name).and_then(Series::last_value)
    }

    pub fn slope(&self, name: &'static str) -> f64 {
        self.series.get(name).map(Series::slope).unwrap_or(0.0)
    }

    /// Flags `value` as anomalous if it falls outside `mean ± k*stddev`
    /// over the series' current window.
    pub fn is_anomalous(&self, name: &'static str, value: f64) -> bool {
        self.series
            .get(name)
            .and_then(Series::mean_and_stddev)
            .is_some_and(|(mean, stddev)| stddev > 0.0 && (value - mean).abs() > ANOMALY_K * stddev)
    }

    /// Records `value` and, if it crosses `threshold`, returns an alert,
    /// deduplicated within a one-minute window per (metric, severity).
    pub fn record_with_alert(
        &self,
        name: &'static str,
        value: f64,
        threshold: AlertThreshold,
    ) -> Option<Alert> {
        self.record(name, value);
        let severity = if value >= threshold.critical {
            Some(AlertSeverity::Critical)
        } else if value >= threshold.warning {
            Some(AlertSeverity::Warning)
        } else {
            None
        }?;

        let now = now_ms();
        let mut last = self.last_alert_at.lock();
        let key = (name, severity);
        if let Some(prev) = last.get(&key) {
            if now.saturating_sub(*prev) < ALERT_DEDUP_WINDOW_MS {
                return None;
            }
        }
        last.insert(key, now);

        let threshold_value = match severity {
            AlertSeverity::Critical => threshold.critical,
            AlertSeverity::Warning => threshold.warning,
        };
        Some(Alert {
            metric: name.to_string(),
            severity,
            value,
            threshold: threshold_value,
            at: now,
            message: format!("{name} = {value:.2} crossed {threshold_value:.2}"),
        })
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_reflect_recorded_values() {
        let registry = MetricsRegistry::new();
        for v in [10.0, 20.0, 30.0, 40.0, 50.0] {
            registry.record(ACQUIRE_LATENCY, v);
        }
        let stats = registry.stats(ACQUIRE_LATENCY);
        assert_eq!(stats.count, 5);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 50.0);
        assert_eq!(stats.mean, 30.0);
    }

    #[test]
    fn alert_is_deduplicated_within_window() {
        let registry = MetricsRegistry::new();
        let threshold = AlertThreshold {
            warning: 50.0,
            critical: 90.0,
        };
        let first = registry.record_with_alert(ERROR_RATE, 95.0, threshold);
        assert!(first.is_some());
        let second = registry.record_with_alert(ERROR_RATE, 96.0, threshold);
        assert!(second.is_none());
    }

    #[test]
    fn anomaly_detector_flags_outliers() {
        let registry = MetricsRegistry::new();
        for _ in 0..20 {
            registry.record(ACQUIRE_LATENCY, 100.0);
        }
        assert!(registry.is_anomalous(ACQUIRE_LATENCY, 100.0) == false);
        assert!(registry.is_anomalous(ACQUIRE_LATENCY, 10_000.0));
    }

    #[test]
    fn slope_is_positive_for_an_increasing_series() {
        let registry = MetricsRegistry::new();
        for v in [10.0, 20.0, 30.0, 40.0, 50.0] {
            registry.record(UTILIZATION_PERCENT, v);
        }
        assert!(registry.slope(UTILIZATION_PERCENT) > 0.0);
    }
}
