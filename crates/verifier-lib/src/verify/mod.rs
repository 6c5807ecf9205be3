//! Recommendation document verification
//!
//! [`Verifier::verify`] walks each created experiment's entry in a
//! list-recommendations response and recomputes what the service should have
//! reported from the posted measurement windows. The walk over one monitored
//! unit stops at its first violation; every unit is walked.

mod plots;
mod walker;


pub use plots::validate_plots;

use serde::Serialize;
use std::time::Instant;

use crate::config::VerifierConfig;
use crate::error::{DocumentError, VerificationFailed, Violation};
use crate::models::{ExperimentDefinition, ExperimentRecommendations, MeasurementWindow};
use crate::observability::{StructuredLogger, VerifierMetrics};
use crate::term::TermName;
use walker::ExperimentWalk;

/// Per-call adjustments a test can make to the expected bookkeeping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyOptions {
    /// Replace accumulated `duration_in_hours` with this value for every term
    ///
    /// Used when only the last window of a fast-forwarded sequence is passed in.
    pub expected_duration_in_hours: Option<f64>,
    /// Only compare `duration_in_hours` on these terms
    pub duration_terms: Option<Vec<TermName>>,
    /// Require the runtimes-recommendations notification on every engine
    pub expect_runtime_recommendations: bool,
}

impl VerifyOptions {
    pub fn with_expected_duration(mut self, hours: f64) -> Self {
        self.expected_duration_in_hours = Some(hours);
        self
    }

    pub fn with_duration_terms(mut self, terms: Vec<TermName>) -> Self {
        self.duration_terms = Some(terms);
        self
    }

    pub fn expecting_runtime_recommendations(mut self) -> Self {
        self.expect_runtime_recommendations = true;
        self
    }

    fn checks_duration(&self, term: &TermName) -> bool {
        self.duration_terms
            .as_ref()
            .map(|terms| terms.contains(term))
            .unwrap_or(true)
    }
}

/// The three documents a verification pass compares
#[derive(Debug, Clone, Default)]
pub struct VerificationInput {
    pub experiments: Vec<ExperimentDefinition>,
    /// Measurement windows; each experiment is walked oldest to newest by `interval_end_time`
    pub results: Vec<MeasurementWindow>,
    pub recommendations: Vec<ExperimentRecommendations>,
}

impl VerificationInput {
    pub fn new(
        experiments: Vec<ExperimentDefinition>,
        results: Vec<MeasurementWindow>,
        recommendations: Vec<ExperimentRecommendations>,
    ) -> Self {
        Self {
            experiments,
            results,
            recommendations,
        }
    }

    /// Decode the create-experiment, update-results and list-recommendations arrays
    pub fn from_json(
        experiments: &str,
        results: &str,
        recommendations: &str,
    ) -> Result<Self, DocumentError> {
        Ok(Self {
            experiments: serde_json::from_str(experiments).map_err(|source| DocumentError::Decode {
                document: "create-experiment",
                source,
            })?,
            results: serde_json::from_str(results).map_err(|source| DocumentError::Decode {
                document: "update-results",
                source,
            })?,
            recommendations: serde_json::from_str(recommendations).map_err(|source| {
                DocumentError::Decode {
                    document: "list-recommendations",
                    source,
                }
            })?,
        })
    }

    fn windows_for(&self, experiment_name: &str) -> Vec<&MeasurementWindow> {
        self.results
            .iter()
            .filter(|w| w.experiment_name == experiment_name)
            .collect()
    }
}

/// Outcome of one verification pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationReport {
    pub units_checked: usize,
    pub violations: Vec<Violation>,
}

impl VerificationReport {
    pub fn is_passed(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn into_result(self) -> Result<(), VerificationFailed> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(VerificationFailed {
                violations: self.violations,
            })
        }
    }

    /// Test adapter: panic with every violation listed
    #[track_caller]
    pub fn assert_passed(&self) {
        if !self.violations.is_empty() {
            let failed = VerificationFailed {
                violations: self.violations.clone(),
            };
            panic!("{}", failed);
        }
    }
}

/// Stateless recommendation consistency verifier
#[derive(Clone)]
pub struct Verifier {
    config: VerifierConfig,
    logger: StructuredLogger,
    metrics: VerifierMetrics,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier {
    pub fn new() -> Self {
        Self::with_config(VerifierConfig::default())
    }

    pub fn with_config(config: VerifierConfig) -> Self {
        Self {
            config,
            logger: StructuredLogger::new("recommendation-verifier"),
            metrics: VerifierMetrics::new(),
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify every created experiment against the recommendations document
    pub fn verify(&self, input: &VerificationInput, options: &VerifyOptions) -> VerificationReport {
        let started = Instant::now();
        self.logger.log_verification_started(
            input.experiments.len(),
            input.results.len(),
            input.recommendations.len(),
        );

        let mut report = VerificationReport::default();
        for experiment in &input.experiments {
            let windows = input.windows_for(&experiment.experiment_name);
            match ExperimentWalk::new(experiment, &windows, options, &self.config) {
                Ok(walk) => walk.run(&input.recommendations, &mut report),
                Err(violation) => report.violations.push(violation),
            }
        }

        for violation in &report.violations {
            self.logger.log_violation(violation);
            self.metrics.inc_violations(violation.kind.label());
        }
        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.add_units_checked(report.units_checked as u64);
        self.metrics.observe_verification(elapsed, report.is_passed());
        self.logger
            .log_verification_finished(report.units_checked, report.violations.len(), elapsed);

        report
    }
}
