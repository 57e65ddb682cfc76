use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// Server-side record of the latest run for a system.
#[derive(Debug, Clone, Deserialize)]
pub struct RunStatusReport {
    pub run_id: String,
    pub system_id: String,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<RunStatusReport>,
}

pub struct StatusClient {
    client: Client,
    base_url: String,
}

impl StatusClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `None` when the server has never started a run for the system.
    pub async fn fetch(&self, system_id: &str) -> Result<Option<RunStatusReport>> {
        let url = status_url(&self.base_url, system_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to request {url}"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response
            .error_for_status()
            .context("Analysis status request failed")?
            .text()
            .await?;

        parse_report(&body)
    }
}

fn status_url(base_url: &str, system_id: &str) -> String {
    format!(
        "{}/systems/{}/analysis-status",
        base_url,
        urlencoding::encode(system_id)
    )
}

fn parse_report(body: &str) -> Result<Option<RunStatusReport>> {
    let envelope: Envelope =
        serde_json::from_str(body).context("Unexpected analysis status response")?;
    Ok(envelope.data)
}
