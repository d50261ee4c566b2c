// Integration tests for the session orchestrator
//
// End-to-end lifecycle over mock collaborators: upload → play → transcribe
// → reveal → automatic analysis, plus the risk interrupt policy and the
// upload-resets-everything invariant. The streaming link points at an
// unreachable address; channel failures surface as warnings, not errors,
// which is exactly the degraded mode these tests exercise.

use async_trait::async_trait;
use callguard::analysis::Analyzer;
use callguard::error::BackendError;
use callguard::risk::{RiskAssessment, RiskScorer, RiskStage};
use callguard::session::{SessionConfig, SessionEvent, SessionOrchestrator};
use callguard::Transcriber;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const UNREACHABLE_WS: &str = "ws://127.0.0.1:9";

struct MockBackend {
    transcript: String,
    stage: RiskStage,
    transcribe_calls: AtomicUsize,
    summarize_calls: AtomicUsize,
    script_calls: AtomicUsize,
    score_calls: AtomicUsize,
}

impl MockBackend {
    fn new(transcript: &str, stage: RiskStage) -> Arc<Self> {
        Arc::new(Self {
            transcript: transcript.to_string(),
            stage,
            transcribe_calls: AtomicUsize::new(0),
            summarize_calls: AtomicUsize::new(0),
            script_calls: AtomicUsize::new(0),
            score_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Transcriber for MockBackend {
    async fn transcribe(&self, _path: &Path) -> Result<String, BackendError> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.transcript.clone())
    }
}

#[async_trait]
impl Analyzer for MockBackend {
    async fn summarize(&self, _text: &str) -> Result<String, BackendError> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        Ok("고객 결제 오류 문의".to_string())
    }

    async fn generate_script(&self, _text: &str) -> Result<String, BackendError> {
        self.script_calls.fetch_add(1, Ordering::SeqCst);
        Ok("공감 후 절차를 안내하세요.".to_string())
    }
}

#[async_trait]
impl RiskScorer for MockBackend {
    async fn score(&self, _text: &str) -> Result<RiskAssessment, BackendError> {
        self.score_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RiskAssessment {
            stage: self.stage,
            score: 90.0,
            emotion: "분노".to_string(),
            rationale: "위협적 표현".to_string(),
        })
    }
}

fn write_test_wav(dir: &TempDir, name: &str, seconds: f64) -> PathBuf {
    let path = dir.path().join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..(16000.0 * seconds) as usize {
        writer.write_sample(((i % 100) as i16) * 50).unwrap();
    }
    writer.finalize().unwrap();
    path
}

fn orchestrator_with(backend: Arc<MockBackend>) -> SessionOrchestrator {
    let config = SessionConfig {
        risk_min_interval: Duration::ZERO,
        ..SessionConfig::default()
    };
    SessionOrchestrator::with_collaborators(
        config,
        backend.clone(),
        backend.clone(),
        backend,
        UNREACHABLE_WS,
    )
}

/// Process events until `done` holds or the bound is hit.
async fn process_until(
    orchestrator: &mut SessionOrchestrator,
    mut done: impl FnMut(&SessionOrchestrator) -> bool,
) {
    for _ in 0..500 {
        if done(orchestrator) {
            return;
        }
        assert!(orchestrator.process_next().await, "event channel closed");
    }
    panic!("condition not reached within event bound");
}

#[tokio::test(start_paused = true)]
async fn play_transcribes_reveals_and_analyzes_exactly_once() {
    let dir = TempDir::new().unwrap();
    let clip = write_test_wav(&dir, "clip.wav", 5.0);

    let backend = MockBackend::new("안녕하세요 문의드립니다", RiskStage::Normal);
    let mut orchestrator = orchestrator_with(backend.clone());

    orchestrator.load_session(&clip).await.unwrap();
    assert_eq!(orchestrator.snapshot().transcript.final_text, "");

    orchestrator.toggle_playback().await.unwrap();
    assert!(orchestrator.snapshot().playback.is_playing);

    process_until(&mut orchestrator, |o| {
        let snap = o.snapshot();
        snap.analysis.summary.is_some() && snap.analysis.script.is_some()
    })
    .await;

    let snap = orchestrator.snapshot();
    assert_eq!(snap.transcript.final_text, "안녕하세요 문의드립니다");
    assert_eq!(snap.transcript.displayed_text, "안녕하세요 문의드립니다");
    assert!(!snap.transcript.is_typing);

    // exactly one summarize call and one script call fired automatically
    assert_eq!(backend.transcribe_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.summarize_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.script_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn danger_stage_stops_everything_and_clears_live_text() {
    let dir = TempDir::new().unwrap();
    let clip = write_test_wav(&dir, "clip.wav", 30.0);

    let backend = MockBackend::new("전사본", RiskStage::Danger);
    let mut orchestrator = orchestrator_with(backend.clone());

    orchestrator.load_session(&clip).await.unwrap();
    orchestrator.toggle_playback().await.unwrap();
    let epoch = orchestrator.epoch();

    // live text crosses the 5-char threshold → risk evaluation fires
    orchestrator
        .handle_event(SessionEvent::LiveTranscript {
            epoch,
            seq: 0,
            text: "결제가".to_string(),
        })
        .await;
    orchestrator
        .handle_event(SessionEvent::LiveTranscript {
            epoch,
            seq: 1,
            text: "안돼요".to_string(),
        })
        .await;
    assert_eq!(orchestrator.snapshot().transcript.live_text, "결제가 안돼요");

    process_until(&mut orchestrator, |o| o.snapshot().interrupted).await;
    assert_eq!(backend.score_calls.load(Ordering::SeqCst), 1);

    let snap = orchestrator.snapshot();
    assert!(!snap.playback.is_playing, "playback must be force-stopped");
    assert_eq!(snap.playback.current_time, 0.0, "playback must be rewound");
    assert_eq!(snap.playback.volume, 0.0, "volume must be silenced");
    assert_eq!(snap.transcript.live_text, "", "live text must be cleared");
    assert_eq!(snap.risk.stage, RiskStage::Danger);
    assert!(snap.risk.error.is_none(), "an interrupt is not an error");
}

#[tokio::test(start_paused = true)]
async fn warning_stage_stops_playback_but_preserves_text() {
    let dir = TempDir::new().unwrap();
    let clip = write_test_wav(&dir, "clip.wav", 30.0);

    let backend = MockBackend::new("전사본", RiskStage::Warning);
    let mut orchestrator = orchestrator_with(backend.clone());

    orchestrator.load_session(&clip).await.unwrap();
    orchestrator.toggle_playback().await.unwrap();
    let epoch = orchestrator.epoch();

    orchestrator
        .handle_event(SessionEvent::LiveTranscript {
            epoch,
            seq: 0,
            text: "지금 당장 해결해 주세요".to_string(),
        })
        .await;

    process_until(&mut orchestrator, |o| o.snapshot().interrupted).await;

    let snap = orchestrator.snapshot();
    assert!(!snap.playback.is_playing);
    assert_eq!(
        snap.transcript.live_text, "지금 당장 해결해 주세요",
        "warning preserves the live text"
    );
    assert_eq!(snap.risk.stage, RiskStage::Warning);
}

#[tokio::test(start_paused = true)]
async fn normal_after_interrupt_clears_the_flag_without_resuming_playback() {
    let dir = TempDir::new().unwrap();
    let clip = write_test_wav(&dir, "clip.wav", 30.0);

    let backend = MockBackend::new("전사본", RiskStage::Warning);
    let mut orchestrator = orchestrator_with(backend.clone());

    orchestrator.load_session(&clip).await.unwrap();
    orchestrator.toggle_playback().await.unwrap();
    let epoch = orchestrator.epoch();

    orchestrator
        .handle_event(SessionEvent::LiveTranscript {
            epoch,
            seq: 0,
            text: "환불 안 해주면 가만 안 둬요".to_string(),
        })
        .await;
    process_until(&mut orchestrator, |o| o.snapshot().interrupted).await;

    orchestrator
        .handle_event(SessionEvent::RiskPushed {
            epoch,
            assessment: RiskAssessment {
                stage: RiskStage::Normal,
                score: 10.0,
                emotion: "안정".to_string(),
                rationale: "정상 대화".to_string(),
            },
        })
        .await;

    let snap = orchestrator.snapshot();
    assert!(!snap.interrupted);
    assert!(
        !snap.playback.is_playing,
        "playback never auto-resumes after an interrupt"
    );
}

#[tokio::test(start_paused = true)]
async fn uploading_a_new_file_resets_all_session_state() {
    let dir = TempDir::new().unwrap();
    let first = write_test_wav(&dir, "first.wav", 10.0);
    let second = write_test_wav(&dir, "second.wav", 3.0);

    let backend = MockBackend::new("첫번째 통화의 전사본입니다", RiskStage::Danger);
    let mut orchestrator = orchestrator_with(backend.clone());

    orchestrator.load_session(&first).await.unwrap();
    let first_id = orchestrator.snapshot().session_id.clone();
    orchestrator.toggle_playback().await.unwrap();
    let epoch = orchestrator.epoch();

    orchestrator
        .handle_event(SessionEvent::LiveTranscript {
            epoch,
            seq: 0,
            text: "계좌 비밀번호 알려줘요".to_string(),
        })
        .await;
    process_until(&mut orchestrator, |o| o.snapshot().interrupted).await;

    orchestrator.load_session(&second).await.unwrap();

    let snap = orchestrator.snapshot();
    assert_ne!(snap.session_id, first_id, "a new session id is assigned");
    assert_eq!(snap.transcript.final_text, "");
    assert_eq!(snap.transcript.displayed_text, "");
    assert_eq!(snap.transcript.live_text, "");
    assert_eq!(snap.risk.stage, RiskStage::Normal);
    assert!(snap.risk.error.is_none());
    assert!(snap.analysis.summary.is_none());
    assert!(snap.analysis.script.is_none());
    assert!(!snap.interrupted);
    assert!(!snap.playback.is_playing);
    assert_eq!(snap.playback.current_time, 0.0);
    assert_eq!(snap.playback.duration, 3.0);
}

#[tokio::test(start_paused = true)]
async fn stale_events_from_a_previous_session_are_dropped() {
    let dir = TempDir::new().unwrap();
    let first = write_test_wav(&dir, "first.wav", 5.0);
    let second = write_test_wav(&dir, "second.wav", 5.0);

    let backend = MockBackend::new("전사본", RiskStage::Normal);
    let mut orchestrator = orchestrator_with(backend.clone());

    orchestrator.load_session(&first).await.unwrap();
    let old_epoch = orchestrator.epoch();
    orchestrator.load_session(&second).await.unwrap();

    orchestrator
        .handle_event(SessionEvent::LiveTranscript {
            epoch: old_epoch,
            seq: 0,
            text: "이전 세션에서 온 텍스트입니다".to_string(),
        })
        .await;

    assert_eq!(
        orchestrator.snapshot().transcript.live_text,
        "",
        "events from an older epoch must not mutate state"
    );
}

#[tokio::test(start_paused = true)]
async fn toggle_without_a_session_is_a_logged_noop() {
    let backend = MockBackend::new("전사본", RiskStage::Normal);
    let mut orchestrator = orchestrator_with(backend.clone());

    orchestrator.toggle_playback().await.unwrap();

    assert!(!orchestrator.snapshot().playback.is_playing);
    assert_eq!(backend.transcribe_calls.load(Ordering::SeqCst), 0);
}
