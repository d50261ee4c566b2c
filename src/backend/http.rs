use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

use super::messages::{
    RiskResponse, ScriptResponse, SummarizeResponse, TextRequest, TranscribeResponse,
};
use super::Transcriber;
use crate::analysis::Analyzer;
use crate::error::BackendError;
use crate::risk::{RiskAssessment, RiskStage, RiskScorer};

/// HTTP client for the analysis backend.
///
/// The backend is an external collaborator; this type implements its
/// declared contract and the status → error mapping, nothing more.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `GET /health`: 200 means connected, anything else (or a network
    /// failure) means disconnected.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                warn!("health check failed: {err}");
                false
            }
        }
    }

    /// `POST /transcribe` with the audio file as multipart form data.
    pub async fn transcribe_file(&self, path: &Path) -> Result<String, BackendError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BackendError::Device(format!("cannot read audio file: {e}")))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        info!("transcribing {} ({} bytes)", file_name, bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!("{}/transcribe", self.base_url);
        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                warn!("transcribe request failed: {err}");
                BackendError::NetworkUnreachable
            })?;
        let resp = Self::ensure_success(resp).await?;

        let body: TranscribeResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        match (body.success, body.text) {
            (true, Some(text)) => Ok(text),
            _ => Err(BackendError::InvalidResponse(
                "transcription reported failure".to_string(),
            )),
        }
    }

    /// `POST /summarize`. Accepts the legacy `text` response alias.
    pub async fn summarize_text(&self, text: &str) -> Result<String, BackendError> {
        let body: SummarizeResponse = self.post_text("summarize", text).await?;
        match (body.success, body.into_summary()) {
            (true, Some(summary)) => Ok(summary),
            _ => Err(BackendError::InvalidResponse(
                "summary reported failure".to_string(),
            )),
        }
    }

    /// `POST /generate-script`.
    pub async fn generate_script_text(&self, text: &str) -> Result<String, BackendError> {
        let body: ScriptResponse = self.post_text("generate-script", text).await?;
        match (body.success, body.script) {
            (true, Some(script)) => Ok(script),
            _ => Err(BackendError::InvalidResponse(
                "script generation reported failure".to_string(),
            )),
        }
    }

    /// `POST /analyze-risk`.
    pub async fn analyze_risk(&self, text: &str) -> Result<RiskAssessment, BackendError> {
        let body: RiskResponse = self.post_text("analyze-risk", text).await?;
        if !body.success {
            return Err(BackendError::InvalidResponse(
                "risk analysis reported failure".to_string(),
            ));
        }
        Ok(RiskAssessment {
            stage: RiskStage::parse(&body.risk_stage),
            score: body.risk_level.clamp(0.0, 100.0),
            emotion: body.emotion,
            rationale: body.analysis,
        })
    }

    async fn post_text<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        text: &str,
    ) -> Result<T, BackendError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let resp = self
            .http
            .post(&url)
            .json(&TextRequest { text })
            .send()
            .await
            .map_err(|err| {
                warn!("{endpoint} request failed: {err}");
                BackendError::NetworkUnreachable
            })?;
        let resp = Self::ensure_success(resp).await?;
        resp.json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(BackendError::from_status(status.as_u16(), &body))
    }
}

#[async_trait]
impl Transcriber for BackendClient {
    async fn transcribe(&self, path: &Path) -> Result<String, BackendError> {
        self.transcribe_file(path).await
    }
}

#[async_trait]
impl Analyzer for BackendClient {
    async fn summarize(&self, text: &str) -> Result<String, BackendError> {
        self.summarize_text(text).await
    }

    async fn generate_script(&self, text: &str) -> Result<String, BackendError> {
        self.generate_script_text(text).await
    }
}

#[async_trait]
impl RiskScorer for BackendClient {
    async fn score(&self, text: &str) -> Result<RiskAssessment, BackendError> {
        self.analyze_risk(text).await
    }
}
