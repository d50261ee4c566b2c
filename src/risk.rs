use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::BackendError;
use crate::session::SessionEvent;

/// Backend-assigned risk category driving the interrupt policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RiskStage {
    #[default]
    Normal,
    Warning,
    Danger,
}

impl RiskStage {
    /// Parse the stage string the backend sends. The production backend
    /// answers in Korean; English aliases are accepted for robustness.
    /// Unknown values are treated as Normal rather than guessed upward.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "위험" | "danger" | "Danger" => RiskStage::Danger,
            "경고" | "주의" | "warning" | "Warning" | "caution" => RiskStage::Warning,
            _ => RiskStage::Normal,
        }
    }
}

/// One completed risk evaluation.
#[derive(Debug, Clone, Default)]
pub struct RiskAssessment {
    pub stage: RiskStage,
    /// Score in [0, 100].
    pub score: f32,
    pub emotion: String,
    pub rationale: String,
}

/// External collaborator that scores a transcript snapshot.
#[async_trait]
pub trait RiskScorer: Send + Sync {
    async fn score(&self, text: &str) -> Result<RiskAssessment, BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonitorState {
    Idle,
    Evaluating,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskSnapshot {
    pub state: MonitorState,
    pub stage: RiskStage,
    pub score: f32,
    pub emotion: String,
    pub rationale: String,
    pub error: Option<String>,
}

/// Serialized risk evaluation against the latest transcript snapshot.
///
/// At most one evaluation is in flight per session: a request arriving while
/// one is outstanding is discarded, not queued, so a slow response can never
/// overwrite the result of a later-started evaluation. Completions are
/// additionally checked against a monotonically increasing request id; only
/// the most recently started request may store its outcome.
pub struct RiskMonitor {
    scorer: Arc<dyn RiskScorer>,
    events: mpsc::Sender<SessionEvent>,
    min_text_chars: usize,
    min_interval: Duration,
    state: MonitorState,
    last: RiskAssessment,
    error: Option<String>,
    next_request_id: u64,
    in_flight: Option<u64>,
    last_started: Option<tokio::time::Instant>,
}

impl RiskMonitor {
    pub fn new(
        scorer: Arc<dyn RiskScorer>,
        events: mpsc::Sender<SessionEvent>,
        min_text_chars: usize,
        min_interval: Duration,
    ) -> Self {
        Self {
            scorer,
            events,
            min_text_chars,
            min_interval,
            state: MonitorState::Idle,
            last: RiskAssessment::default(),
            error: None,
            next_request_id: 0,
            in_flight: None,
            last_started: None,
        }
    }

    /// Start an evaluation for `text`, unless one is already in flight, the
    /// text is below the minimum length, or the previous evaluation started
    /// less than the backpressure interval ago. Returns whether a request
    /// was actually issued.
    pub fn try_evaluate(&mut self, epoch: u64, text: &str) -> bool {
        if text.trim().chars().count() < self.min_text_chars {
            debug!("risk evaluation skipped: text below minimum length");
            return false;
        }

        if self.in_flight.is_some() {
            debug!("risk evaluation skipped: one already in flight");
            return false;
        }

        if let Some(started) = self.last_started {
            if started.elapsed() < self.min_interval {
                debug!("risk evaluation skipped: within minimum interval");
                return false;
            }
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.in_flight = Some(request_id);
        self.last_started = Some(tokio::time::Instant::now());
        self.state = MonitorState::Evaluating;

        info!(request_id, "risk evaluation started ({} chars)", text.chars().count());

        let scorer = Arc::clone(&self.scorer);
        let events = self.events.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            let outcome = scorer.score(&text).await;
            let _ = events
                .send(SessionEvent::RiskResolved {
                    epoch,
                    request_id,
                    outcome,
                })
                .await;
        });

        true
    }

    /// Record the outcome of an evaluation. Outcomes from any request other
    /// than the most recently started one are dropped; a failure keeps the
    /// last known stage so a transient error cannot spuriously unblock.
    pub fn complete(&mut self, request_id: u64, outcome: Result<RiskAssessment, BackendError>) {
        if self.in_flight == Some(request_id) {
            self.in_flight = None;
            self.state = MonitorState::Idle;
        }

        if request_id + 1 != self.next_request_id {
            debug!(request_id, "stale risk result dropped");
            return;
        }

        match outcome {
            Ok(assessment) => {
                info!(
                    stage = ?assessment.stage,
                    score = assessment.score,
                    "risk evaluation complete"
                );
                self.last = assessment;
                self.error = None;
            }
            Err(err) => {
                warn!("risk evaluation failed: {err}");
                self.error = Some(err.to_string());
            }
        }
    }

    /// Apply an assessment pushed by the backend over the analysis channel.
    /// Pushed results represent the freshest signal and supersede whatever
    /// HTTP evaluation might still be pending.
    pub fn apply_push(&mut self, assessment: RiskAssessment) {
        info!(stage = ?assessment.stage, score = assessment.score, "risk update pushed");
        self.next_request_id += 1;
        self.last = assessment;
        self.error = None;
    }

    pub fn stage(&self) -> RiskStage {
        self.last.stage
    }

    pub fn snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            state: self.state,
            stage: self.last.stage,
            score: self.last.score,
            emotion: self.last.emotion.clone(),
            rationale: self.last.rationale.clone(),
            error: self.error.clone(),
        }
    }

    pub fn reset(&mut self) {
        self.state = MonitorState::Idle;
        self.last = RiskAssessment::default();
        self.error = None;
        self.in_flight = None;
        self.last_started = None;
        // request ids keep counting so late results from the previous
        // session can never match the freshest-id check
        self.next_request_id += 1;
    }
}
