use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::BackendError;

/// Capture source feeding the audio-stream channel.
///
/// The engine's stand-in for the browser's microphone + MediaRecorder pair:
/// a started source emits raw PCM chunks at a fixed cadence until stopped
/// or exhausted. Stopping must always release the underlying resource, not
/// merely stop emitting.
#[async_trait]
pub trait ChunkSource: Send + Sync + std::fmt::Debug {
    /// Start capturing. Returns the channel the chunks arrive on.
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, BackendError>;

    /// Stop capturing and release the device/file handle.
    async fn stop(&mut self) -> Result<(), BackendError>;

    fn is_capturing(&self) -> bool;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// What to capture from.
#[derive(Debug, Clone)]
pub enum CaptureInput {
    /// Replay a recorded WAV file in real time (testing, batch review).
    File(PathBuf),
    /// Live microphone input.
    Microphone,
}

pub struct ChunkSourceFactory;

impl ChunkSourceFactory {
    pub fn create(
        input: CaptureInput,
        chunk_duration: Duration,
    ) -> Result<Box<dyn ChunkSource>, BackendError> {
        match input {
            CaptureInput::File(path) => Ok(Box::new(FileChunkSource::new(path, chunk_duration))),
            CaptureInput::Microphone => Err(BackendError::Device(
                "microphone capture requires a platform audio backend".to_string(),
            )),
        }
    }
}

/// Replays a 16-bit PCM WAV file as timed binary chunks, pacing emission to
/// the chunk duration so downstream consumers see a live-capture cadence.
#[derive(Debug)]
pub struct FileChunkSource {
    path: PathBuf,
    chunk_duration: Duration,
    capturing: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl FileChunkSource {
    pub fn new(path: PathBuf, chunk_duration: Duration) -> Self {
        Self {
            path,
            chunk_duration,
            capturing: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }
}

#[async_trait]
impl ChunkSource for FileChunkSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, BackendError> {
        if self.capturing.load(Ordering::SeqCst) {
            return Err(BackendError::Device("capture already active".to_string()));
        }

        let reader = hound::WavReader::open(&self.path)
            .map_err(|e| BackendError::Device(format!("cannot open capture source: {e}")))?;
        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<_, _>>()
            .map_err(|e| BackendError::Device(format!("cannot read capture source: {e}")))?;

        let samples_per_chunk = ((spec.sample_rate as u128
            * spec.channels as u128
            * self.chunk_duration.as_millis())
            / 1000)
            .max(1) as usize;

        info!(
            "file capture started: {} ({} samples, {}ms chunks)",
            self.path.display(),
            samples.len(),
            self.chunk_duration.as_millis()
        );

        let (tx, rx) = mpsc::channel(8);
        self.capturing.store(true, Ordering::SeqCst);
        let capturing = Arc::clone(&self.capturing);
        let chunk_interval = self.chunk_duration;

        self.task = Some(tokio::spawn(async move {
            for chunk in samples.chunks(samples_per_chunk) {
                tokio::time::sleep(chunk_interval).await;
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }
                let bytes: Vec<u8> = chunk.iter().flat_map(|s| s.to_le_bytes()).collect();
                debug!("emitting capture chunk ({} bytes)", bytes.len());
                if tx.send(bytes).await.is_err() {
                    break;
                }
            }
            capturing.store(false, Ordering::SeqCst);
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), BackendError> {
        self.capturing.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        info!("file capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "file"
    }
}
