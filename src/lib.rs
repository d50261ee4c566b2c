pub mod analysis;
pub mod audio;
pub mod backend;
pub mod config;
pub mod error;
pub mod risk;
pub mod session;
pub mod transcript;

pub use analysis::{AnalysisSession, AnalysisSnapshot, Analyzer};
pub use audio::{
    AudioPlayer, AudioSource, CaptureInput, ChunkSource, ChunkSourceFactory, FileChunkSource,
    PlaybackState,
};
pub use backend::{BackendClient, ChannelKind, ChannelState, StreamingLink, Transcriber};
pub use config::Config;
pub use error::BackendError;
pub use risk::{RiskAssessment, RiskMonitor, RiskScorer, RiskSnapshot, RiskStage};
pub use session::{SessionConfig, SessionEvent, SessionOrchestrator, SessionSnapshot};
pub use transcript::{TranscriptSession, TranscriptSnapshot};
