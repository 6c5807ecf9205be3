//! API client for communicating with the recommendation service

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;
use verifier_lib::ExperimentRecommendations;

/// API client for the recommendation service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// List recommendations for one experiment
    pub async fn list_recommendations(&self, experiment_name: &str) -> Result<Vec<ExperimentRecommendations>> {
        tracing::debug!(experiment_name = %experiment_name, "Fetching recommendations");
        self.get("listRecommendations", &[("experiment_name", experiment_name)])
            .await
            .with_context(|| format!("Failed to list recommendations for {}", experiment_name))
    }
}
