use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::AnalysisSnapshot;
use crate::audio::PlaybackState;
use crate::backend::ChannelState;
use crate::risk::RiskSnapshot;
use crate::transcript::TranscriptSnapshot;

/// Point-in-time view of everything a dashboard renders: one field group
/// per panel, each with its own error so panels fail independently.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    /// When the current session was created (at upload).
    pub started_at: DateTime<Utc>,
    pub playback: PlaybackState,
    pub transcript: TranscriptSnapshot,
    pub risk: RiskSnapshot,
    pub analysis: AnalysisSnapshot,
    pub analysis_channel: ChannelState,
    pub audio_channel: ChannelState,
    /// Risk interrupt engaged. A control action, not an error.
    pub interrupted: bool,
    pub channel_error: Option<String>,
}
