//! HTTP client for the prediction engine service

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use super::{EngineRequest, EngineResponse, PredictionEngine};
use crate::error::{AppError, Result};

/// Talks to the prediction engine over its JSON endpoint
pub struct HttpPredictionEngine {
    client: Client,
    endpoint: Url,
}

impl HttpPredictionEngine {
    pub fn new(endpoint: Url, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PredictionEngine for HttpPredictionEngine {
    fn id(&self) -> &'static str {
        "http"
    }

    async fn generate_slips(&self, request: &EngineRequest) -> Result<EngineResponse> {
        tracing::info!(
            job_id = %request.job_id,
            matches = request.match_snapshots.len(),
            strategy = %request.strategy,
            "Submitting generation request to engine"
        );

        let response = self
            .client
            .post(self.endpoint.as_str())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(format!("Engine request timed out: {}", e))
                } else {
                    AppError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "Engine returned an error response");
            return Err(AppError::Engine(format!(
                "Engine returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: EngineResponse = response.json().await?;
        tracing::debug!(
            job_id = %request.job_id,
            candidates = parsed.alternative_slips.len(),
            "Engine response received"
        );
        Ok(parsed)
    }
}
