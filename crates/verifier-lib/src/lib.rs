//! Recommendation consistency verification
//!
//! This crate provides the core functionality for:
//! - Decoding create-experiment, update-results and list-recommendations documents
//! - Term window and duration arithmetic
//! - Config/variation reconciliation against posted metrics
//! - Notification presence checks
//! - Walking a recommendations document and reporting every violation

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod observability;
pub mod reconcile;
pub mod term;
pub mod verify;

pub use config::{LogFormat, VerifierConfig};
pub use error::{DocumentError, Location, VerificationFailed, Violation, ViolationKind};
pub use models::*;
pub use notifications::{Notification, NotificationCode, NotificationKind, Notifications};
pub use observability::{StructuredLogger, VerifierMetrics};
pub use term::{TermName, TermSpec};
pub use verify::{VerificationInput, VerificationReport, Verifier, VerifyOptions};
