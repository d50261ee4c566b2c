use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::source::AudioSource;
use crate::session::SessionEvent;

/// Volume restored when a new source is loaded.
pub const DEFAULT_VOLUME: f32 = 0.5;

/// Resolution of the playback clock.
const CLOCK_TICK_MS: u64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    /// Seconds from the start of the source.
    pub current_time: f64,
    pub duration: f64,
    pub volume: f32,
}

/// Owns play/pause/seek state for the current audio source and its
/// time/duration telemetry. The clock task is telemetry only and never
/// triggers business logic; it emits a single `PlaybackEnded` event when
/// the position reaches the duration.
pub struct AudioPlayer {
    events: mpsc::Sender<SessionEvent>,
    source: Option<AudioSource>,
    is_playing: Arc<AtomicBool>,
    position_ms: Arc<AtomicU64>,
    volume: f32,
    clock_task: Option<JoinHandle<()>>,
}

impl AudioPlayer {
    pub fn new(events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            events,
            source: None,
            is_playing: Arc::new(AtomicBool::new(false)),
            position_ms: Arc::new(AtomicU64::new(0)),
            volume: DEFAULT_VOLUME,
            clock_task: None,
        }
    }

    /// Replace the current source. Playback resets to stopped/zero, the
    /// volume is restored, and the previous source is dropped.
    pub fn load(&mut self, source: AudioSource) {
        self.stop_clock();
        self.is_playing.store(false, Ordering::SeqCst);
        self.position_ms.store(0, Ordering::SeqCst);
        self.volume = DEFAULT_VOLUME;
        info!(
            "audio source loaded: {} ({:.1}s)",
            source.path.display(),
            source.duration_seconds
        );
        self.source = Some(source);
    }

    /// Flip play/pause. Rejected (logged no-op) without a loaded source.
    /// Returns whether playback is active afterwards.
    pub fn toggle(&mut self, epoch: u64) -> bool {
        let Some(source) = &self.source else {
            warn!("toggle ignored: no audio source loaded");
            return false;
        };

        if self.is_playing.load(Ordering::SeqCst) {
            info!("playback paused at {:.1}s", self.current_time());
            self.pause();
            false
        } else {
            info!("playback started");
            let duration_ms = (source.duration_seconds * 1000.0) as u64;
            self.start_clock(epoch, duration_ms);
            true
        }
    }

    /// User pause: keeps position and volume.
    pub fn pause(&mut self) {
        self.is_playing.store(false, Ordering::SeqCst);
        self.stop_clock();
    }

    /// Interrupt-policy stop: pause, rewind to zero, silence the volume.
    pub fn force_stop(&mut self) {
        info!("playback force-stopped");
        self.pause();
        self.position_ms.store(0, Ordering::SeqCst);
        self.volume = 0.0;
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::SeqCst)
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn current_time(&self) -> f64 {
        self.position_ms.load(Ordering::SeqCst) as f64 / 1000.0
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            is_playing: self.is_playing(),
            current_time: self.current_time(),
            duration: self
                .source
                .as_ref()
                .map(|s| s.duration_seconds)
                .unwrap_or(0.0),
            volume: self.volume,
        }
    }

    fn start_clock(&mut self, epoch: u64, duration_ms: u64) {
        self.is_playing.store(true, Ordering::SeqCst);

        let playing = Arc::clone(&self.is_playing);
        let position = Arc::clone(&self.position_ms);
        let events = self.events.clone();

        self.clock_task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(CLOCK_TICK_MS)).await;
                if !playing.load(Ordering::SeqCst) {
                    break;
                }
                let now = position.fetch_add(CLOCK_TICK_MS, Ordering::SeqCst) + CLOCK_TICK_MS;
                if duration_ms > 0 && now >= duration_ms {
                    position.store(duration_ms, Ordering::SeqCst);
                    playing.store(false, Ordering::SeqCst);
                    let _ = events.send(SessionEvent::PlaybackEnded { epoch }).await;
                    break;
                }
            }
        }));
    }

    fn stop_clock(&mut self) {
        if let Some(task) = self.clock_task.take() {
            task.abort();
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.stop_clock();
    }
}
