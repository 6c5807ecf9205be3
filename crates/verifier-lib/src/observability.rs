//! Observability infrastructure for the verifier
//!
//! Provides:
//! - Prometheus metrics (verifications by outcome, violations by kind, latency)
//! - Structured logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::error::Violation;

/// Histogram buckets for verification latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<VerifierMetricsInner> = OnceLock::new();

struct VerifierMetricsInner {
    verifications_total: IntCounterVec,
    violations_total: IntCounterVec,
    units_checked_total: IntCounter,
    verification_latency_seconds: Histogram,
}

impl VerifierMetricsInner {
    fn new() -> Self {
        Self {
            verifications_total: register_int_counter_vec!(
                "recommendation_verifier_verifications_total",
                "Verification passes by outcome",
                &["outcome"]
            )
            .expect("Failed to register verifications_total"),

            violations_total: register_int_counter_vec!(
                "recommendation_verifier_violations_total",
                "Violations found, by kind",
                &["kind"]
            )
            .expect("Failed to register violations_total"),

            units_checked_total: register_int_counter!(
                "recommendation_verifier_units_checked_total",
                "Containers and namespaces walked"
            )
            .expect("Failed to register units_checked_total"),

            verification_latency_seconds: register_histogram!(
                "recommendation_verifier_latency_seconds",
                "Time spent verifying one recommendations document",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register verification_latency_seconds"),
        }
    }
}

/// Lightweight handle to the global verifier metrics
#[derive(Clone)]
pub struct VerifierMetrics {
    _private: (),
}

impl Default for VerifierMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifierMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(VerifierMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &VerifierMetricsInner {
        GLOBAL_METRICS.get_or_init(VerifierMetricsInner::new)
    }

    /// Record a finished verification pass
    pub fn observe_verification(&self, duration_secs: f64, passed: bool) {
        let outcome = if passed { "passed" } else { "failed" };
        self.inner()
            .verifications_total
            .with_label_values(&[outcome])
            .inc();
        self.inner().verification_latency_seconds.observe(duration_secs);
    }

    pub fn inc_violations(&self, kind: &str) {
        self.inner().violations_total.with_label_values(&[kind]).inc();
    }

    pub fn add_units_checked(&self, count: u64) {
        self.inner().units_checked_total.inc_by(count);
    }
}

/// Structured logger for verification events
#[derive(Clone)]
pub struct StructuredLogger {
    suite: String,
}

impl StructuredLogger {
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
        }
    }

    pub fn log_verification_started(&self, experiments: usize, windows: usize, documents: usize) {
        debug!(
            event = "verification_started",
            suite = %self.suite,
            experiments = experiments,
            measurement_windows = windows,
            recommendation_documents = documents,
            "Verifying recommendations"
        );
    }

    pub fn log_violation(&self, violation: &Violation) {
        warn!(
            event = "violation_found",
            suite = %self.suite,
            kind = violation.kind.label(),
            location = %violation.location,
            detail = %violation.kind,
            "Recommendation check failed"
        );
    }

    pub fn log_verification_finished(&self, units_checked: usize, violations: usize, elapsed_secs: f64) {
        if violations == 0 {
            info!(
                event = "verification_finished",
                suite = %self.suite,
                units_checked = units_checked,
                violations = 0,
                elapsed_secs = elapsed_secs,
                "Recommendations consistent"
            );
        } else {
            warn!(
                event = "verification_finished",
                suite = %self.suite,
                units_checked = units_checked,
                violations = violations,
                elapsed_secs = elapsed_secs,
                "Recommendations inconsistent"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_metrics_creation() {
        // Registration is global; repeated handles share one registry entry.
        let metrics = VerifierMetrics::new();
        let again = VerifierMetrics::new();

        metrics.observe_verification(0.001, true);
        again.observe_verification(0.002, false);
        metrics.inc_violations("numeric");
        metrics.add_units_checked(3);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("remote-monitoring");
        assert_eq!(logger.suite, "remote-monitoring");
    }
}
