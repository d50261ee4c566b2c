// Integration tests for summary/script generation
//
// These verify the once-per-transcript automatic trigger, independent
// failure of the two halves, and retry re-issuing only what is missing.

use async_trait::async_trait;
use callguard::analysis::{AnalysisSession, Analyzer};
use callguard::error::BackendError;
use callguard::session::SessionEvent;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct ScriptedAnalyzer {
    summary: Result<String, BackendError>,
    script: Result<String, BackendError>,
    delay: Duration,
    summarize_calls: AtomicUsize,
    script_calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    fn new(
        summary: Result<String, BackendError>,
        script: Result<String, BackendError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            summary,
            script,
            delay: Duration::ZERO,
            summarize_calls: AtomicUsize::new(0),
            script_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn summarize(&self, _text: &str) -> Result<String, BackendError> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.summary.clone()
    }

    async fn generate_script(&self, _text: &str) -> Result<String, BackendError> {
        self.script_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.script.clone()
    }
}

fn session_with(
    analyzer: Arc<ScriptedAnalyzer>,
) -> (AnalysisSession, mpsc::Receiver<SessionEvent>) {
    let (tx, rx) = mpsc::channel(64);
    (AnalysisSession::new(analyzer, tx, 10), rx)
}

/// Feed both halves' completions back into the session.
async fn resolve_pending(session: &mut AnalysisSession, rx: &mut mpsc::Receiver<SessionEvent>) {
    loop {
        let snap = session.snapshot();
        if !snap.summarizing && !snap.generating_script {
            break;
        }
        match rx.recv().await {
            Some(SessionEvent::SummaryResolved { outcome, .. }) => {
                session.complete_summary(outcome)
            }
            Some(SessionEvent::ScriptResolved { outcome, .. }) => session.complete_script(outcome),
            other => panic!("expected analysis completion, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn auto_trigger_fires_exactly_once_per_transcript() {
    let analyzer = ScriptedAnalyzer::new(
        Ok("결제 오류 문의".to_string()),
        Ok("먼저 공감을 표현하세요.".to_string()),
    );
    let (mut session, mut rx) = session_with(analyzer.clone());

    let transcript = "안녕하세요 결제가 계속 실패해서 문의드립니다";
    session.auto_request(1, transcript);
    resolve_pending(&mut session, &mut rx).await;

    // reveal completion observed again (e.g. replay): must not re-fire
    session.auto_request(1, transcript);
    resolve_pending(&mut session, &mut rx).await;

    assert_eq!(analyzer.summarize_calls.load(Ordering::SeqCst), 1);
    assert_eq!(analyzer.script_calls.load(Ordering::SeqCst), 1);

    let snap = session.snapshot();
    assert_eq!(snap.summary.as_deref(), Some("결제 오류 문의"));
    assert_eq!(snap.script.as_deref(), Some("먼저 공감을 표현하세요."));
}

#[tokio::test]
async fn short_text_is_skipped_without_surfacing_an_error() {
    let analyzer = ScriptedAnalyzer::new(Ok("요약".to_string()), Ok("스크립트".to_string()));
    let (mut session, _rx) = session_with(analyzer.clone());

    session.request(1, "짧은 텍스트");
    assert_eq!(analyzer.summarize_calls.load(Ordering::SeqCst), 0);
    assert_eq!(analyzer.script_calls.load(Ordering::SeqCst), 0);

    let snap = session.snapshot();
    assert!(snap.summary_error.is_none());
    assert!(snap.script_error.is_none());
}

#[tokio::test]
async fn halves_fail_independently() {
    let analyzer = ScriptedAnalyzer::new(
        Err(BackendError::MissingCredential),
        Ok("고객님의 불편에 공감을 표현하세요.".to_string()),
    );
    let (mut session, mut rx) = session_with(analyzer.clone());

    session.request(1, "환불 규정이 이해가 안 가서 전화드렸습니다");
    resolve_pending(&mut session, &mut rx).await;

    let snap = session.snapshot();
    assert_eq!(
        snap.summary_error.as_deref(),
        Some("backend is missing its API credential (OPENAI_API_KEY)")
    );
    assert!(snap.summary.is_none());
    // the script half is unaffected by the summary failure
    assert_eq!(
        snap.script.as_deref(),
        Some("고객님의 불편에 공감을 표현하세요.")
    );
    assert!(snap.script_error.is_none());
}

#[tokio::test]
async fn retry_reissues_only_the_missing_half() {
    let analyzer = ScriptedAnalyzer::new(
        Err(BackendError::BackendInternal),
        Ok("차분히 안내해 주세요.".to_string()),
    );
    let (mut session, mut rx) = session_with(analyzer.clone());

    session.request(1, "상담 내용이 충분히 길어야 합니다");
    resolve_pending(&mut session, &mut rx).await;
    assert!(session.snapshot().summary_error.is_some());

    session.retry(1);
    resolve_pending(&mut session, &mut rx).await;

    assert_eq!(analyzer.summarize_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        analyzer.script_calls.load(Ordering::SeqCst),
        1,
        "the successful half must not be re-issued"
    );
}

#[tokio::test]
async fn regenerate_reissues_both_halves() {
    let analyzer = ScriptedAnalyzer::new(Ok("요약본".to_string()), Ok("응대 스크립트".to_string()));
    let (mut session, mut rx) = session_with(analyzer.clone());

    session.request(1, "첫번째 통화 내용을 정리해 주세요");
    resolve_pending(&mut session, &mut rx).await;

    session.regenerate(1);
    resolve_pending(&mut session, &mut rx).await;

    assert_eq!(analyzer.summarize_calls.load(Ordering::SeqCst), 2);
    assert_eq!(analyzer.script_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn requests_are_rejected_while_one_is_in_flight() {
    let analyzer = Arc::new(ScriptedAnalyzer {
        summary: Ok("요약".to_string()),
        script: Ok("스크립트".to_string()),
        delay: Duration::from_millis(200),
        summarize_calls: AtomicUsize::new(0),
        script_calls: AtomicUsize::new(0),
    });
    let (mut session, mut rx) = session_with(analyzer.clone());

    session.request(1, "통화 내용 전체가 들어있는 텍스트");
    session.request(1, "통화 내용 전체가 들어있는 텍스트");
    resolve_pending(&mut session, &mut rx).await;

    assert_eq!(analyzer.summarize_calls.load(Ordering::SeqCst), 1);
    assert_eq!(analyzer.script_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reset_allows_a_new_transcript_to_trigger_again() {
    let analyzer = ScriptedAnalyzer::new(Ok("요약".to_string()), Ok("스크립트".to_string()));
    let (mut session, mut rx) = session_with(analyzer.clone());

    session.auto_request(1, "첫번째 업로드의 전사본입니다");
    resolve_pending(&mut session, &mut rx).await;

    session.reset();
    session.auto_request(2, "두번째 업로드의 전사본입니다");
    resolve_pending(&mut session, &mut rx).await;

    assert_eq!(analyzer.summarize_calls.load(Ordering::SeqCst), 2);
}
