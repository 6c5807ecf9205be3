//! Violation taxonomy and document errors
//!
//! Checks return `Result<(), ViolationKind>`; the document walker attaches a
//! [`Location`] to turn a kind into a reportable [`Violation`].

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// What went wrong, independent of where in the document it happened
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// Identity or shape disagreement (type/name/namespace, container count, key sets)
    #[error("{field} mismatch: expected {expected:?}, found {actual:?}")]
    Structural {
        field: String,
        expected: String,
        actual: String,
    },

    /// Computed value disagrees with the value the service reported
    #[error("{path} mismatch: expected {expected}, found {actual}")]
    Numeric {
        path: String,
        expected: f64,
        actual: f64,
    },

    /// Missing, unexpected or wrongly worded notification
    #[error("notification {code}: {reason} (notifications: {notifications})")]
    Notification {
        code: String,
        reason: String,
        notifications: String,
    },

    /// Something the check needs is absent, or present where it must not be
    #[error("{detail}")]
    MissingData { detail: String },
}

impl ViolationKind {
    pub fn structural(
        field: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        Self::Structural {
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn numeric(path: impl Into<String>, expected: f64, actual: f64) -> Self {
        Self::Numeric {
            path: path.into(),
            expected,
            actual,
        }
    }

    pub fn missing(detail: impl Into<String>) -> Self {
        Self::MissingData {
            detail: detail.into(),
        }
    }

    /// Short label used for metrics and table output
    pub fn label(&self) -> &'static str {
        match self {
            ViolationKind::Structural { .. } => "structural",
            ViolationKind::Numeric { .. } => "numeric",
            ViolationKind::Notification { .. } => "notification",
            ViolationKind::MissingData { .. } => "missing_data",
        }
    }
}

/// Position of a check inside the recommendation document tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

impl Location {
    pub fn experiment(name: impl Into<String>) -> Self {
        Self {
            experiment: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_object(&self, object: impl Into<String>) -> Self {
        Self {
            object: Some(object.into()),
            ..self.clone()
        }
    }

    pub fn with_unit(&self, unit: impl Into<String>) -> Self {
        Self {
            unit: Some(unit.into()),
            ..self.clone()
        }
    }

    pub fn with_window(&self, window: impl Into<String>) -> Self {
        Self {
            window: Some(window.into()),
            ..self.clone()
        }
    }

    pub fn with_term(&self, term: impl Into<String>) -> Self {
        Self {
            term: Some(term.into()),
            ..self.clone()
        }
    }

    pub fn with_engine(&self, engine: impl Into<String>) -> Self {
        Self {
            engine: Some(engine.into()),
            ..self.clone()
        }
    }

    /// Attach this location to a violation kind
    pub fn violation(&self, kind: ViolationKind) -> Violation {
        Violation {
            location: self.clone(),
            kind,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            ("experiment", &self.experiment),
            ("object", &self.object),
            ("unit", &self.unit),
            ("window", &self.window),
            ("term", &self.term),
            ("engine", &self.engine),
        ]
        .iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| format!("{}={}", key, v)))
        .collect();

        if parts.is_empty() {
            write!(f, "<document>")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

/// A located violation
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{location}: {kind}")]
pub struct Violation {
    pub location: Location,
    pub kind: ViolationKind,
}

/// Returned by [`crate::VerificationReport::into_result`] when any check failed
#[derive(Debug, Clone, Error)]
#[error("verification failed with {} violation(s):\n{}", .violations.len(), render(.violations))]
pub struct VerificationFailed {
    pub violations: Vec<Violation>,
}

fn render(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Input documents that could not be decoded
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to decode {document} document: {source}")]
    Decode {
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
