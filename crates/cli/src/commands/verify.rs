//! Verification of saved documents

use anyhow::{Context, Result};
use std::path::Path;
use verifier_lib::{VerificationInput, VerificationReport, Verifier, VerifyOptions};

use crate::output::{print_report, OutputFormat};

/// Verify a saved list-recommendations response
pub fn run(
    verifier: &Verifier,
    experiment: &Path,
    results: &Path,
    recommendations: &Path,
    options: &VerifyOptions,
    format: OutputFormat,
) -> Result<()> {
    let input = VerificationInput::from_json(
        &read_document(experiment)?,
        &read_document(results)?,
        &read_document(recommendations)?,
    )?;

    let report = verifier.verify(&input, options);
    finish(&report, format)
}

pub fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Print the report; a report with violations fails the command
pub fn finish(report: &VerificationReport, format: OutputFormat) -> Result<()> {
    print_report(report, format);
    if !report.is_passed() {
        anyhow::bail!(
            "verification failed with {} violation(s)",
            report.violations.len()
        );
    }
    Ok(())
}
