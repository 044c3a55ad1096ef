use crate::config::Config;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Whatever the analysis service returned. Passed through untouched.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AnalysisResult(pub Value);

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("analysis service responded with status {0}")]
    Status(u16),
    #[error("analysis response could not be decoded: {0}")]
    Decode(String),
    #[error("analysis service rejected the image: {0}")]
    Rejected(String),
}

/// One analysis attempt. Readings are `None` while the sensors are not connected.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub image: String,
    pub mime_type: String,
    pub heart_rate: Option<f64>,
    pub gsr: Option<f64>,
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;
}

#[derive(Clone)]
pub struct HttpAnalysisClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpAnalysisClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.analysis_timeout)
            .build()?;

        Ok(HttpAnalysisClient {
            client,
            url: config.analysis_url.clone(),
            api_key: config.analysis_api_key.clone(),
        })
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AnalysisError::Status(status.as_u16()));
        }

        let body = resp.bytes().await?;
        let value: Value =
            serde_json::from_slice(&body).map_err(|e| AnalysisError::Decode(e.to_string()))?;

        if let Some(reason) = value.get("error").and_then(Value::as_str) {
            return Err(AnalysisError::Rejected(reason.to_string()));
        }

        Ok(AnalysisResult(value))
    }
}
