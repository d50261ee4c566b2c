use anyhow::Result;
use serde::Deserialize;

use crate::session::SessionConfig;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub tuning: TuningConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL for the HTTP endpoints (transcribe/summarize/...).
    pub base_url: String,
    /// Base URL for the WebSocket endpoints (ws/real-time-analysis, ws/audio-stream).
    pub ws_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TuningConfig {
    /// Reveal cadence in milliseconds per character.
    pub reveal_interval_ms: u64,
    /// Capture chunk cadence in seconds.
    pub capture_chunk_secs: u64,
    /// Minimum live-text length (chars) before risk evaluation fires.
    pub min_live_text_chars: usize,
    /// Minimum transcript length (chars) before summary/script generation.
    pub min_analysis_chars: usize,
    /// Minimum spacing between two risk evaluations, in seconds.
    pub risk_min_interval_secs: u64,
}

impl Config {
    /// Load configuration from `CALLGUARD_*` environment variables on top of
    /// built-in defaults. There is no config file; the backend base URL is
    /// the only setting most deployments override
    /// (`CALLGUARD_BACKEND__BASE_URL`).
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("backend.base_url", "http://localhost:8000")?
            .set_default("backend.ws_base_url", "ws://localhost:8000")?
            .set_default("tuning.reveal_interval_ms", 120i64)?
            .set_default("tuning.capture_chunk_secs", 2i64)?
            .set_default("tuning.min_live_text_chars", 5i64)?
            .set_default("tuning.min_analysis_chars", 10i64)?
            .set_default("tuning.risk_min_interval_secs", 3i64)?
            .add_source(config::Environment::with_prefix("CALLGUARD").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Per-session tuning derived from the loaded values.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reveal_interval: Duration::from_millis(self.tuning.reveal_interval_ms),
            capture_chunk: Duration::from_secs(self.tuning.capture_chunk_secs),
            min_live_text_chars: self.tuning.min_live_text_chars,
            min_analysis_chars: self.tuning.min_analysis_chars,
            risk_min_interval: Duration::from_secs(self.tuning.risk_min_interval_secs),
            ..SessionConfig::default()
        }
    }
}
