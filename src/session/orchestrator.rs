use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::event::SessionEvent;
use super::snapshot::SessionSnapshot;
use crate::analysis::{AnalysisSession, Analyzer};
use crate::audio::{AudioPlayer, AudioSource, CaptureInput, ChunkSource, ChunkSourceFactory};
use crate::backend::{BackendClient, StreamingLink, Transcriber};
use crate::error::BackendError;
use crate::risk::{RiskMonitor, RiskScorer, RiskStage};
use crate::transcript::TranscriptSession;

const EVENT_QUEUE_DEPTH: usize = 256;

/// Wires playback, transcript, risk, analysis and the streaming link into
/// one lifecycle per uploaded recording, and applies the interrupt policy.
///
/// All coordination goes through the session event channel: components
/// spawn their async work and report completions as [`SessionEvent`]s,
/// which `handle_event` dispatches on the caller's task. Uploading a new
/// recording bumps the session epoch; events produced under an older epoch
/// are dropped, which logically cancels everything still in flight.
pub struct SessionOrchestrator {
    config: SessionConfig,
    session_id: String,
    started_at: chrono::DateTime<Utc>,
    epoch: u64,
    source_path: Option<PathBuf>,

    player: AudioPlayer,
    transcript: TranscriptSession,
    risk: RiskMonitor,
    analysis: AnalysisSession,
    link: StreamingLink,
    transcriber: Arc<dyn Transcriber>,

    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,

    transcribe_task: Option<JoinHandle<()>>,
    interrupted: bool,
    /// Whether playback was user-active when the interrupt engaged; decides
    /// capture resumption when the stage returns to Normal.
    resume_capture_on_normal: bool,
    last_stage: RiskStage,
    channel_error: Option<String>,
}

impl SessionOrchestrator {
    /// Build against the real backend client for every collaborator role.
    pub fn new(
        config: SessionConfig,
        backend: Arc<BackendClient>,
        ws_base_url: impl Into<String>,
    ) -> Self {
        let transcriber: Arc<dyn Transcriber> = backend.clone();
        let analyzer: Arc<dyn Analyzer> = backend.clone();
        let scorer: Arc<dyn RiskScorer> = backend;
        Self::with_collaborators(config, transcriber, analyzer, scorer, ws_base_url)
    }

    pub fn with_collaborators(
        config: SessionConfig,
        transcriber: Arc<dyn Transcriber>,
        analyzer: Arc<dyn Analyzer>,
        scorer: Arc<dyn RiskScorer>,
        ws_base_url: impl Into<String>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

        let player = AudioPlayer::new(events_tx.clone());
        let transcript = TranscriptSession::new(events_tx.clone(), config.reveal_interval);
        let risk = RiskMonitor::new(
            scorer,
            events_tx.clone(),
            config.min_live_text_chars,
            config.risk_min_interval,
        );
        let analysis = AnalysisSession::new(analyzer, events_tx.clone(), config.min_analysis_chars);
        let link = StreamingLink::new(ws_base_url, events_tx.clone());
        let session_id = config.session_id.clone();

        Self {
            config,
            session_id,
            started_at: Utc::now(),
            epoch: 0,
            source_path: None,
            player,
            transcript,
            risk,
            analysis,
            link,
            transcriber,
            events_tx,
            events_rx,
            transcribe_task: None,
            interrupted: false,
            resume_capture_on_normal: false,
            last_stage: RiskStage::Normal,
            channel_error: None,
        }
    }

    /// Replace the session with a new recording. Every downstream component
    /// is reset before any new-session work can begin, and in-flight work
    /// from the previous session is cancelled by the epoch bump.
    pub async fn load_session(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let source = AudioSource::probe(path).context("Failed to load audio source")?;

        self.epoch += 1;
        self.session_id = format!("call-{}", uuid::Uuid::new_v4());
        self.started_at = Utc::now();
        info!(session_id = %self.session_id, "session loaded: {}", path.display());

        if let Some(task) = self.transcribe_task.take() {
            task.abort();
        }
        self.link.disconnect_all().await;
        self.link.reset();
        self.player.load(source);
        self.transcript.reset();
        self.risk.reset();
        self.analysis.reset();
        self.interrupted = false;
        self.resume_capture_on_normal = false;
        self.last_stage = RiskStage::Normal;
        self.channel_error = None;
        self.source_path = Some(path.to_path_buf());

        // anything still queued belongs to the previous session
        while let Ok(event) = self.events_rx.try_recv() {
            debug!("discarding stale event: {event:?}");
        }

        Ok(())
    }

    /// Flip play/pause. Starting playback for the first time kicks off the
    /// one-shot transcription and opens both streaming channels; pausing
    /// tears the channels down again.
    pub async fn toggle_playback(&mut self) -> Result<()> {
        if self.player.is_playing() {
            self.player.pause();
            self.link.disconnect_all().await;
            return Ok(());
        }

        if !self.player.toggle(self.epoch) {
            return Ok(());
        }

        if self.transcript.final_text().is_empty() {
            if !self.transcript.is_transcribing() {
                self.spawn_transcription();
            }
        } else if self.transcript.displayed_text().is_empty() && !self.transcript.is_typing() {
            let text = self.transcript.final_text().to_string();
            self.transcript.start_reveal(self.epoch, &text);
        }

        // a deliberate user play overrides a previous interrupt
        self.interrupted = false;
        self.connect_streaming().await;

        Ok(())
    }

    /// Re-issue only the failed/missing analysis halves.
    pub fn retry_analysis(&mut self) {
        self.analysis.retry(self.epoch);
    }

    /// Explicit user request to regenerate summary and script together.
    pub fn regenerate_analysis(&mut self) {
        self.analysis.regenerate(self.epoch);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            playback: self.player.state(),
            transcript: self.transcript.snapshot(),
            risk: self.risk.snapshot(),
            analysis: self.analysis.snapshot(),
            analysis_channel: self.link.analysis_state(),
            audio_channel: self.link.audio_state(),
            interrupted: self.interrupted,
            channel_error: self.channel_error.clone(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Dispatch one queued event; `false` once the channel closes.
    pub async fn process_next(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event).await;
                true
            }
            None => false,
        }
    }

    /// Dispatch everything currently queued without waiting.
    pub async fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event).await;
        }
    }

    /// Event loop. Runs for the lifetime of the orchestrator.
    pub async fn run(&mut self) {
        while self.process_next().await {}
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        if event.epoch() != self.epoch {
            debug!("stale event dropped: {event:?}");
            return;
        }

        match event {
            SessionEvent::TranscriptionFinished { result, .. } => match result {
                Ok(text) => {
                    self.transcript.set_final(text.clone());
                    self.transcript.start_reveal(self.epoch, &text);
                }
                Err(err) => {
                    warn!("transcription failed: {err}");
                    self.transcript.set_transcription_error(err.to_string());
                }
            },
            SessionEvent::RevealCompleted { text, .. } => {
                info!("reveal complete");
                self.analysis.auto_request(self.epoch, &text);
            }
            SessionEvent::LiveTranscript { seq, text, .. } => {
                if self.interrupted {
                    debug!("live chunk ignored while interrupted");
                    return;
                }
                if !self.transcript.append_live(seq, &text) {
                    return;
                }
                if self.transcript.live_char_count() >= self.config.min_live_text_chars {
                    let snapshot_text = self.transcript.live_text().to_string();
                    self.risk.try_evaluate(self.epoch, &snapshot_text);
                    if let Err(err) = self.link.send_text_chunk(&snapshot_text).await {
                        debug!("text chunk not sent: {err}");
                    }
                }
            }
            SessionEvent::RiskResolved {
                request_id,
                outcome,
                ..
            } => {
                self.risk.complete(request_id, outcome);
                self.apply_stage_policy().await;
            }
            SessionEvent::RiskPushed { assessment, .. } => {
                self.risk.apply_push(assessment);
                self.apply_stage_policy().await;
            }
            SessionEvent::SummaryResolved { outcome, .. } => {
                self.analysis.complete_summary(outcome);
            }
            SessionEvent::ScriptResolved { outcome, .. } => {
                self.analysis.complete_script(outcome);
            }
            SessionEvent::ChannelClosed { channel, .. } => {
                info!("channel closed: {channel:?}");
                self.link.on_closed(channel).await;
            }
            SessionEvent::ChannelError {
                channel, message, ..
            } => {
                warn!("channel error on {channel:?}: {message}");
                self.channel_error = Some(message);
            }
            SessionEvent::PlaybackEnded { .. } => {
                info!("playback finished");
                self.link.disconnect_all().await;
            }
        }
    }

    fn spawn_transcription(&mut self) {
        let Some(path) = self.source_path.clone() else {
            return;
        };

        info!("transcription started");
        self.transcript.set_transcribing(true);

        let transcriber = Arc::clone(&self.transcriber);
        let events = self.events_tx.clone();
        let epoch = self.epoch;
        self.transcribe_task = Some(tokio::spawn(async move {
            let result = transcriber.transcribe(&path).await;
            let _ = events
                .send(SessionEvent::TranscriptionFinished { epoch, result })
                .await;
        }));
    }

    async fn connect_streaming(&mut self) {
        if let Err(err) = self.link.connect_analysis(self.epoch).await {
            warn!("analysis channel unavailable: {err}");
            self.channel_error = Some(err.to_string());
        }

        match self.capture_source() {
            Ok(source) => {
                if let Err(err) = self.link.connect_audio_capture(self.epoch, source).await {
                    warn!("audio capture unavailable: {err}");
                    self.channel_error = Some(err.to_string());
                }
            }
            Err(err) => {
                warn!("capture source unavailable: {err}");
                self.channel_error = Some(err.to_string());
            }
        }
    }

    fn capture_source(&self) -> Result<Box<dyn ChunkSource>, BackendError> {
        let path = self
            .source_path
            .clone()
            .ok_or_else(|| BackendError::Device("no session source loaded".to_string()))?;
        ChunkSourceFactory::create(CaptureInput::File(path), self.config.capture_chunk)
    }

    /// React to a stage change. An interrupt is an intentional control
    /// action: nothing here touches any error field.
    async fn apply_stage_policy(&mut self) {
        let stage = self.risk.stage();
        let prev = self.last_stage;
        self.last_stage = stage;

        match stage {
            RiskStage::Danger => {
                if !self.interrupted {
                    self.interrupt(true).await;
                } else if prev != RiskStage::Danger {
                    // escalation while already stopped still blanks the live text
                    self.transcript.clear_live();
                }
            }
            RiskStage::Warning => {
                if !self.interrupted {
                    self.interrupt(false).await;
                }
            }
            RiskStage::Normal => {
                if prev != RiskStage::Normal && self.interrupted {
                    info!("risk back to normal; clearing interrupt");
                    self.interrupted = false;
                    if self.resume_capture_on_normal {
                        self.resume_capture().await;
                    }
                    self.resume_capture_on_normal = false;
                }
            }
        }
    }

    async fn interrupt(&mut self, clear_live: bool) {
        warn!(clear_live, "risk interrupt engaged");
        self.resume_capture_on_normal = self.player.is_playing();
        self.player.force_stop();
        self.link.disconnect_all().await;
        if clear_live {
            self.transcript.clear_live();
        }
        self.interrupted = true;
    }

    /// Capture (never playback) comes back when the stage clears.
    async fn resume_capture(&mut self) {
        match self.capture_source() {
            Ok(source) => {
                if let Err(err) = self.link.connect_audio_capture(self.epoch, source).await {
                    warn!("capture resume failed: {err}");
                }
            }
            Err(err) => warn!("capture resume failed: {err}"),
        }
    }
}
