pub mod capture;
pub mod player;
pub mod source;

pub use capture::{CaptureInput, ChunkSource, ChunkSourceFactory, FileChunkSource};
pub use player::{AudioPlayer, PlaybackState, DEFAULT_VOLUME};
pub use source::AudioSource;
