//! Verification against a live recommendation service

use anyhow::{Context, Result};
use std::path::Path;
use verifier_lib::{ExperimentDefinition, MeasurementWindow, VerificationInput, Verifier, VerifyOptions};

use super::verify::{finish, read_document};
use crate::client::ApiClient;
use crate::output::{print_info, OutputFormat};

/// Fetch recommendations for every created experiment and verify them
pub async fn run(
    client: &ApiClient,
    verifier: &Verifier,
    experiment: &Path,
    results: &Path,
    options: &VerifyOptions,
    format: OutputFormat,
) -> Result<()> {
    let experiments: Vec<ExperimentDefinition> = serde_json::from_str(&read_document(experiment)?)
        .context("Failed to parse create-experiment document")?;
    let windows: Vec<MeasurementWindow> = serde_json::from_str(&read_document(results)?)
        .context("Failed to parse update-results document")?;

    let mut recommendations = Vec::new();
    for experiment in &experiments {
        let mut listed = client.list_recommendations(&experiment.experiment_name).await?;
        if matches!(format, OutputFormat::Table) {
            print_info(&format!(
                "Fetched {} recommendation document(s) for {}",
                listed.len(),
                experiment.experiment_name
            ));
        }
        recommendations.append(&mut listed);
    }

    let input = VerificationInput::new(experiments, windows, recommendations);
    let report = verifier.verify(&input, options);
    finish(&report, format)
}
