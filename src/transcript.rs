use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::session::SessionEvent;

/// Filler phrases the streaming transcriber hallucinates on silence.
/// Stored lowercase; matching is ASCII-case-insensitive.
const FILLER_PHRASES: &[&str] = &[
    "thank you for watching",
    "thanks for watching",
    "please subscribe",
    "시청해주셔서 감사합니다",
    "구독과 좋아요 부탁드립니다",
    "다음 영상에서 만나요",
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptSnapshot {
    pub final_text: String,
    pub displayed_text: String,
    pub live_text: String,
    pub is_transcribing: bool,
    pub is_typing: bool,
    pub error: Option<String>,
}

/// Owns the transcript text model: the one-shot finalized transcript, its
/// progressive reveal, and the live transcript assembled from streaming
/// chunks.
pub struct TranscriptSession {
    events: mpsc::Sender<SessionEvent>,
    reveal_interval: Duration,
    final_text: String,
    /// Written exclusively by the reveal task; always a prefix of the text
    /// the running reveal was started from.
    displayed: Arc<Mutex<String>>,
    is_typing: Arc<AtomicBool>,
    reveal_task: Option<JoinHandle<()>>,
    live_text: String,
    last_live_seq: Option<u64>,
    is_transcribing: bool,
    error: Option<String>,
}

impl TranscriptSession {
    pub fn new(events: mpsc::Sender<SessionEvent>, reveal_interval: Duration) -> Self {
        Self {
            events,
            reveal_interval,
            final_text: String::new(),
            displayed: Arc::new(Mutex::new(String::new())),
            is_typing: Arc::new(AtomicBool::new(false)),
            reveal_task: None,
            live_text: String::new(),
            last_live_seq: None,
            is_transcribing: false,
            error: None,
        }
    }

    pub fn set_transcribing(&mut self, transcribing: bool) {
        self.is_transcribing = transcribing;
        if transcribing {
            self.error = None;
        }
    }

    /// Store the finalized transcript. Set at most once per session by the
    /// orchestrator when the transcription call completes.
    pub fn set_final(&mut self, text: String) {
        info!("transcript finalized ({} chars)", text.chars().count());
        self.final_text = text;
        self.is_transcribing = false;
        self.error = None;
    }

    pub fn set_transcription_error(&mut self, message: String) {
        self.is_transcribing = false;
        self.error = Some(message);
    }

    /// Begin revealing `text` character by character at the configured
    /// cadence. A reveal already in progress is abandoned and the new one
    /// starts from empty; two reveals never interleave. Exactly one
    /// completion event is emitted per reveal that runs to the end.
    pub fn start_reveal(&mut self, epoch: u64, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        if let Some(task) = self.reveal_task.take() {
            task.abort();
        }
        self.displayed.lock().unwrap().clear();
        self.is_typing.store(true, Ordering::SeqCst);

        let displayed = Arc::clone(&self.displayed);
        let typing = Arc::clone(&self.is_typing);
        let events = self.events.clone();
        let interval = self.reveal_interval;
        let text = text.to_string();

        info!("reveal started ({} chars)", text.chars().count());
        self.reveal_task = Some(tokio::spawn(async move {
            let mut shown = String::with_capacity(text.len());
            for ch in text.chars() {
                tokio::time::sleep(interval).await;
                shown.push(ch);
                *displayed.lock().unwrap() = shown.clone();
            }
            typing.store(false, Ordering::SeqCst);
            let _ = events
                .send(SessionEvent::RevealCompleted { epoch, text })
                .await;
        }));
    }

    /// Append a live transcription chunk. Chunks are de-duplicated by their
    /// sequence id, normalized (trimmed, filler phrases stripped), and
    /// joined with a single space. Returns whether anything was appended.
    pub fn append_live(&mut self, seq: u64, raw: &str) -> bool {
        if let Some(last) = self.last_live_seq {
            if seq <= last {
                debug!(seq, "duplicate live chunk dropped");
                return false;
            }
        }
        self.last_live_seq = Some(seq);

        let cleaned = strip_fillers(raw);
        if cleaned.is_empty() {
            debug!(seq, "live chunk empty after filtering");
            return false;
        }

        if !self.live_text.is_empty() {
            self.live_text.push(' ');
        }
        self.live_text.push_str(&cleaned);
        true
    }

    /// Danger-stage interrupt drops the live text; the finalized transcript
    /// and its reveal are untouched.
    pub fn clear_live(&mut self) {
        self.live_text.clear();
    }

    pub fn final_text(&self) -> &str {
        &self.final_text
    }

    pub fn displayed_text(&self) -> String {
        self.displayed.lock().unwrap().clone()
    }

    pub fn live_text(&self) -> &str {
        &self.live_text
    }

    pub fn live_char_count(&self) -> usize {
        self.live_text.chars().count()
    }

    pub fn is_transcribing(&self) -> bool {
        self.is_transcribing
    }

    pub fn is_typing(&self) -> bool {
        self.is_typing.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot {
            final_text: self.final_text.clone(),
            displayed_text: self.displayed_text(),
            live_text: self.live_text.clone(),
            is_transcribing: self.is_transcribing,
            is_typing: self.is_typing(),
            error: self.error.clone(),
        }
    }

    /// Clear every field and cancel any in-flight reveal.
    pub fn reset(&mut self) {
        if let Some(task) = self.reveal_task.take() {
            task.abort();
        }
        self.final_text.clear();
        self.displayed.lock().unwrap().clear();
        self.is_typing.store(false, Ordering::SeqCst);
        self.live_text.clear();
        self.last_live_seq = None;
        self.is_transcribing = false;
        self.error = None;
    }
}

impl Drop for TranscriptSession {
    fn drop(&mut self) {
        if let Some(task) = self.reveal_task.take() {
            task.abort();
        }
    }
}

/// Trim a chunk and strip known filler phrases. Matching lowers only ASCII
/// so byte offsets stay valid for multi-byte text.
fn strip_fillers(raw: &str) -> String {
    let mut out = raw.trim().to_string();
    for phrase in FILLER_PHRASES {
        loop {
            let haystack = out.to_ascii_lowercase();
            match haystack.find(phrase) {
                Some(pos) => {
                    out.replace_range(pos..pos + phrase.len(), "");
                }
                None => break,
            }
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
