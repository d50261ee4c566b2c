use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::BackendError;
use crate::session::SessionEvent;

/// External collaborator that produces the summary and response script.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, BackendError>;
    async fn generate_script(&self, text: &str) -> Result<String, BackendError>;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisSnapshot {
    pub summary: Option<String>,
    pub script: Option<String>,
    pub summary_error: Option<String>,
    pub script_error: Option<String>,
    pub summarizing: bool,
    pub generating_script: bool,
}

/// Tracks summary and response-script generation for one finalized
/// transcript. The two halves are issued concurrently and fail
/// independently; each is produced at most once per transcript unless a
/// manual retry re-requests the failed half.
pub struct AnalysisSession {
    analyzer: Arc<dyn Analyzer>,
    events: mpsc::Sender<SessionEvent>,
    min_chars: usize,
    state: AnalysisSnapshot,
    /// Transcript backing the current results; retry re-uses it.
    current_text: Option<String>,
    /// Transcript the automatic trigger already fired for.
    auto_fired_for: Option<String>,
}

impl AnalysisSession {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        events: mpsc::Sender<SessionEvent>,
        min_chars: usize,
    ) -> Self {
        Self {
            analyzer,
            events,
            min_chars,
            state: AnalysisSnapshot::default(),
            current_text: None,
            auto_fired_for: None,
        }
    }

    /// Automatic trigger on reveal completion: fires at most once per
    /// distinct finalized transcript, no matter how often it is called.
    pub fn auto_request(&mut self, epoch: u64, text: &str) {
        if self.auto_fired_for.as_deref() == Some(text) {
            debug!("analysis already auto-triggered for this transcript");
            return;
        }
        self.auto_fired_for = Some(text.to_string());
        self.request(epoch, text);
    }

    /// Request summary and script generation for `text`. Skipped (logged,
    /// not surfaced) when the text is too short, when either half is still
    /// in flight, or when both results already exist for this text.
    pub fn request(&mut self, epoch: u64, text: &str) {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.min_chars {
            debug!(
                "analysis skipped: text below minimum length ({} chars)",
                trimmed.chars().count()
            );
            return;
        }

        if self.state.summarizing || self.state.generating_script {
            warn!("analysis skipped: generation already in flight");
            return;
        }

        if self.current_text.as_deref() == Some(trimmed)
            && self.state.summary.is_some()
            && self.state.script.is_some()
        {
            debug!("analysis skipped: summary and script already generated");
            return;
        }

        if self.current_text.as_deref() != Some(trimmed) {
            self.state = AnalysisSnapshot::default();
            self.current_text = Some(trimmed.to_string());
        }

        self.spawn_missing(epoch);
    }

    /// Explicit user request to regenerate summary and script together,
    /// discarding whatever the current text already produced.
    pub fn regenerate(&mut self, epoch: u64) {
        if self.current_text.is_none() {
            warn!("regenerate ignored: no transcript to analyze");
            return;
        }
        if self.state.summarizing || self.state.generating_script {
            warn!("regenerate ignored: generation already in flight");
            return;
        }
        self.state = AnalysisSnapshot::default();
        self.spawn_missing(epoch);
    }

    /// Re-issue only the failed or missing halves for the current text.
    pub fn retry(&mut self, epoch: u64) {
        if self.current_text.is_none() {
            warn!("retry ignored: no transcript to analyze");
            return;
        }
        if self.state.summarizing || self.state.generating_script {
            warn!("retry ignored: generation already in flight");
            return;
        }
        self.spawn_missing(epoch);
    }

    fn spawn_missing(&mut self, epoch: u64) {
        let text = self
            .current_text
            .clone()
            .expect("spawn_missing called without text");

        if self.state.summary.is_none() {
            self.state.summarizing = true;
            self.state.summary_error = None;
            let analyzer = Arc::clone(&self.analyzer);
            let events = self.events.clone();
            let text = text.clone();
            info!("summary generation started");
            tokio::spawn(async move {
                let outcome = analyzer.summarize(&text).await;
                let _ = events
                    .send(SessionEvent::SummaryResolved { epoch, outcome })
                    .await;
            });
        }

        if self.state.script.is_none() {
            self.state.generating_script = true;
            self.state.script_error = None;
            let analyzer = Arc::clone(&self.analyzer);
            let events = self.events.clone();
            info!("script generation started");
            tokio::spawn(async move {
                let outcome = analyzer.generate_script(&text).await;
                let _ = events
                    .send(SessionEvent::ScriptResolved { epoch, outcome })
                    .await;
            });
        }
    }

    pub fn complete_summary(&mut self, outcome: Result<String, BackendError>) {
        self.state.summarizing = false;
        match outcome {
            Ok(summary) => {
                info!("summary generation complete ({} chars)", summary.chars().count());
                self.state.summary = Some(summary);
                self.state.summary_error = None;
            }
            Err(err) => {
                warn!("summary generation failed: {err}");
                self.state.summary_error = Some(err.to_string());
            }
        }
    }

    pub fn complete_script(&mut self, outcome: Result<String, BackendError>) {
        self.state.generating_script = false;
        match outcome {
            Ok(script) => {
                info!("script generation complete ({} chars)", script.chars().count());
                self.state.script = Some(script);
                self.state.script_error = None;
            }
            Err(err) => {
                warn!("script generation failed: {err}");
                self.state.script_error = Some(err.to_string());
            }
        }
    }

    pub fn snapshot(&self) -> AnalysisSnapshot {
        self.state.clone()
    }

    pub fn reset(&mut self) {
        self.state = AnalysisSnapshot::default();
        self.current_text = None;
        self.auto_fired_for = None;
    }
}
