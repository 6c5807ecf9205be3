//! Verifier configuration
//!
//! Passed to [`crate::Verifier::with_config`]; the library never reads the
//! environment itself.

use serde::{Deserialize, Serialize};

/// Log output format for binaries embedding the verifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Validate `plots` blocks on terms that carry recommendations
    pub check_plots: bool,
    /// Treat error-typed notifications next to recommendation data as violations
    pub reject_error_notifications: bool,
    pub log_format: LogFormat,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            check_plots: true,
            reject_error_notifications: true,
            log_format: LogFormat::Json,
        }
    }
}
