//! VirusTotal v3 client.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::error::ScanError;
use super::verdict::AnalysisAttributes;
use super::{AnalysisHandle, AnalysisStatus, ScanService};

const API_KEY_HEADER: &str = "x-apikey";

#[derive(Deserialize)]
struct UploadResponse {
    data: Option<UploadData>,
}

#[derive(Deserialize)]
struct UploadData {
    id: Option<String>,
}

#[derive(Deserialize)]
struct AnalysisResponse {
    data: AnalysisData,
}

#[derive(Deserialize)]
struct AnalysisData {
    attributes: AnalysisAttributes,
}

#[derive(Debug, Clone)]
pub struct VirusTotalClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl VirusTotalClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn ensure_configured(&self) -> Result<(), ScanError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(ScanError::NotConfigured)
        }
    }

    async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ScanError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        log::warn!("Scan service returned {}", status);
        Err(ScanError::http_status(status.as_u16(), &body))
    }
}

pub(crate) fn parse_status(attributes: AnalysisAttributes) -> AnalysisStatus {
    match attributes.status.as_str() {
        "queued" => AnalysisStatus::Queued,
        "in-progress" => AnalysisStatus::InProgress,
        "completed" => AnalysisStatus::Completed(attributes),
        other => AnalysisStatus::Unknown(other.to_string()),
    }
}

#[async_trait]
impl ScanService for VirusTotalClient {
    async fn submit(&self, bytes: Vec<u8>, filename: &str) -> Result<AnalysisHandle, ScanError> {
        self.ensure_configured()?;

        let part = Part::bytes(bytes).file_name(filename.to_string());
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/files", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await?;
        let response = Self::error_for_status(response).await?;

        let body: UploadResponse = response.json().await?;
        body.data
            .and_then(|d| d.id)
            .filter(|id| !id.is_empty())
            .map(AnalysisHandle)
            .ok_or(ScanError::MissingAnalysisId)
    }

    async fn fetch_analysis(&self, handle: &AnalysisHandle) -> Result<AnalysisStatus, ScanError> {
        self.ensure_configured()?;

        let response = self
            .http
            .get(format!("{}/analyses/{}", self.base_url, handle.0))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let response = Self::error_for_status(response).await?;

        let body: AnalysisResponse = response.json().await?;
        Ok(parse_status(body.data.attributes))
    }
}
