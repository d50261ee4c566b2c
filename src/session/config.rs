use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for one monitoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (regenerated on every upload)
    pub session_id: String,

    /// Reveal cadence per character
    /// Default: 120ms
    pub reveal_interval: Duration,

    /// Cadence of captured audio chunks sent to the backend
    /// Default: 2 seconds
    pub capture_chunk: Duration,

    /// Minimum accumulated live-text length (chars) before risk evaluation
    pub min_live_text_chars: usize,

    /// Minimum transcript length (chars) before summary/script generation
    pub min_analysis_chars: usize,

    /// Backpressure: minimum spacing between two risk evaluations
    pub risk_min_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("call-{}", uuid::Uuid::new_v4()),
            reveal_interval: Duration::from_millis(120),
            capture_chunk: Duration::from_secs(2),
            min_live_text_chars: 5,
            min_analysis_chars: 10,
            risk_min_interval: Duration::from_secs(3),
        }
    }
}
