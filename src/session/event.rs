use crate::backend::ChannelKind;
use crate::error::BackendError;
use crate::risk::RiskAssessment;

/// Everything the orchestrator reacts to, as explicit messages.
///
/// Each event carries the session epoch it was produced under and, where it
/// matters, the exact text snapshot it refers to — completions never read
/// ambient mutable state. Events from a previous epoch are dropped at
/// dispatch.
#[derive(Debug)]
pub enum SessionEvent {
    /// One-shot transcription finished (or failed).
    TranscriptionFinished {
        epoch: u64,
        result: Result<String, BackendError>,
    },
    /// A reveal ran to completion for `text`.
    RevealCompleted { epoch: u64, text: String },
    /// A live transcription chunk arrived on the audio channel.
    LiveTranscript { epoch: u64, seq: u64, text: String },
    /// An HTTP risk evaluation resolved.
    RiskResolved {
        epoch: u64,
        request_id: u64,
        outcome: Result<RiskAssessment, BackendError>,
    },
    /// The backend pushed an assessment over the analysis channel.
    RiskPushed {
        epoch: u64,
        assessment: RiskAssessment,
    },
    SummaryResolved {
        epoch: u64,
        outcome: Result<String, BackendError>,
    },
    ScriptResolved {
        epoch: u64,
        outcome: Result<String, BackendError>,
    },
    ChannelClosed {
        epoch: u64,
        channel: ChannelKind,
    },
    ChannelError {
        epoch: u64,
        channel: ChannelKind,
        message: String,
    },
    /// The playback clock reached the end of the source.
    PlaybackEnded { epoch: u64 },
}

impl SessionEvent {
    pub fn epoch(&self) -> u64 {
        match self {
            SessionEvent::TranscriptionFinished { epoch, .. }
            | SessionEvent::RevealCompleted { epoch, .. }
            | SessionEvent::LiveTranscript { epoch, .. }
            | SessionEvent::RiskResolved { epoch, .. }
            | SessionEvent::RiskPushed { epoch, .. }
            | SessionEvent::SummaryResolved { epoch, .. }
            | SessionEvent::ScriptResolved { epoch, .. }
            | SessionEvent::ChannelClosed { epoch, .. }
            | SessionEvent::ChannelError { epoch, .. }
            | SessionEvent::PlaybackEnded { epoch } => *epoch,
        }
    }
}
