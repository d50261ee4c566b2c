use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::messages::{AnalysisClientMessage, AnalysisServerMessage, AudioStreamServerMessage};
use crate::audio::ChunkSource;
use crate::error::BackendError;
use crate::risk::{RiskAssessment, RiskStage};
use crate::session::SessionEvent;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelKind {
    Analysis,
    AudioStream,
}

/// The two duplex channels to the backend: JSON analysis messages on
/// `ws/real-time-analysis` and raw audio capture on `ws/audio-stream`.
///
/// Channels are created and destroyed only by the session orchestrator.
/// There is no automatic reconnection; a dropped channel surfaces as a
/// `ChannelClosed` event and the orchestrator decides whether to reopen.
pub struct StreamingLink {
    ws_base_url: String,
    events: mpsc::Sender<SessionEvent>,

    analysis_state: ChannelState,
    analysis_sink: Option<Arc<Mutex<WsSink>>>,
    analysis_read_task: Option<JoinHandle<()>>,

    audio_state: ChannelState,
    audio_sink: Option<Arc<Mutex<WsSink>>>,
    audio_read_task: Option<JoinHandle<()>>,
    pump_task: Option<JoinHandle<()>>,
    capture: Option<Box<dyn ChunkSource>>,

    /// Outbound text_chunk ids on the analysis channel.
    next_chunk_id: u64,
    /// Sequence numbers stamped on inbound transcription chunks.
    next_live_seq: Arc<AtomicU64>,
}

impl StreamingLink {
    pub fn new(ws_base_url: impl Into<String>, events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            ws_base_url: ws_base_url.into().trim_end_matches('/').to_string(),
            events,
            analysis_state: ChannelState::Disconnected,
            analysis_sink: None,
            analysis_read_task: None,
            audio_state: ChannelState::Disconnected,
            audio_sink: None,
            audio_read_task: None,
            pump_task: None,
            capture: None,
            next_chunk_id: 0,
            next_live_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn analysis_state(&self) -> ChannelState {
        self.analysis_state
    }

    pub fn audio_state(&self) -> ChannelState {
        self.audio_state
    }

    pub fn capture_active(&self) -> bool {
        self.capture.as_ref().is_some_and(|c| c.is_capturing())
    }

    /// Open the real-time analysis channel.
    pub async fn connect_analysis(&mut self, epoch: u64) -> Result<(), BackendError> {
        if self.analysis_state != ChannelState::Disconnected {
            debug!("analysis channel already {:?}", self.analysis_state);
            return Ok(());
        }

        self.analysis_state = ChannelState::Connecting;
        let url = format!("{}/ws/real-time-analysis", self.ws_base_url);
        info!("connecting analysis channel: {url}");

        let (stream, _) = connect_async(&url).await.map_err(|err| {
            self.analysis_state = ChannelState::Disconnected;
            BackendError::Channel(err.to_string())
        })?;

        let (sink, read) = stream.split();
        self.analysis_sink = Some(Arc::new(Mutex::new(sink)));
        self.analysis_read_task = Some(Self::spawn_analysis_reader(
            read,
            self.events.clone(),
            epoch,
        ));
        self.analysis_state = ChannelState::Connected;
        info!("analysis channel connected");

        Ok(())
    }

    /// Open the audio-stream channel and start pumping capture chunks into
    /// it. Takes ownership of the capture source; `disconnect_all` releases
    /// it again.
    pub async fn connect_audio_capture(
        &mut self,
        epoch: u64,
        mut source: Box<dyn ChunkSource>,
    ) -> Result<(), BackendError> {
        if self.audio_state != ChannelState::Disconnected {
            debug!("audio channel already {:?}", self.audio_state);
            return Ok(());
        }

        self.audio_state = ChannelState::Connecting;
        let url = format!("{}/ws/audio-stream", self.ws_base_url);
        info!("connecting audio-stream channel: {url}");

        let (stream, _) = connect_async(&url).await.map_err(|err| {
            self.audio_state = ChannelState::Disconnected;
            BackendError::Channel(err.to_string())
        })?;

        let (sink, read) = stream.split();
        let sink = Arc::new(Mutex::new(sink));

        self.audio_read_task = Some(Self::spawn_audio_reader(
            read,
            self.events.clone(),
            Arc::clone(&self.next_live_seq),
            epoch,
        ));

        let chunk_rx = match source.start().await {
            Ok(rx) => rx,
            Err(err) => {
                // capture failed; tear the half-open channel down again
                if let Some(task) = self.audio_read_task.take() {
                    task.abort();
                }
                let _ = sink.lock().await.close().await;
                self.audio_state = ChannelState::Disconnected;
                return Err(err);
            }
        };
        info!("capture started via {} source", source.name());
        self.capture = Some(source);

        let pump_sink = Arc::clone(&sink);
        self.pump_task = Some(tokio::spawn(async move {
            let mut chunk_rx = chunk_rx;
            while let Some(chunk) = chunk_rx.recv().await {
                debug!("forwarding capture chunk ({} bytes)", chunk.len());
                if pump_sink
                    .lock()
                    .await
                    .send(Message::Binary(chunk))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }));

        self.audio_sink = Some(sink);
        self.audio_state = ChannelState::Connected;
        info!("audio-stream channel connected");

        Ok(())
    }

    /// Send one normalized text chunk for server-side risk analysis.
    pub async fn send_text_chunk(&mut self, text: &str) -> Result<(), BackendError> {
        let sink = self
            .analysis_sink
            .as_ref()
            .ok_or_else(|| BackendError::Channel("analysis channel not connected".to_string()))?;

        let chunk_id = self.next_chunk_id;
        self.next_chunk_id += 1;

        let message = AnalysisClientMessage::TextChunk {
            text: text.to_string(),
            chunk_id,
        };
        let payload = serde_json::to_string(&message)
            .map_err(|e| BackendError::Channel(e.to_string()))?;

        sink.lock()
            .await
            .send(Message::Text(payload))
            .await
            .map_err(|e| BackendError::Channel(e.to_string()))?;

        debug!(chunk_id, "text chunk sent for analysis");
        Ok(())
    }

    /// The orchestrator observed a `ChannelClosed` event; drop our half.
    pub async fn on_closed(&mut self, channel: ChannelKind) {
        match channel {
            ChannelKind::Analysis => {
                if let Some(task) = self.analysis_read_task.take() {
                    task.abort();
                }
                self.analysis_sink = None;
                self.analysis_state = ChannelState::Disconnected;
            }
            ChannelKind::AudioStream => self.teardown_audio().await,
        }
    }

    /// Tear down both channels and release the capture source. Idempotent;
    /// safe to call when nothing is connected.
    pub async fn disconnect_all(&mut self) {
        if let Some(task) = self.analysis_read_task.take() {
            task.abort();
        }
        if let Some(sink) = self.analysis_sink.take() {
            let _ = sink.lock().await.close().await;
        }
        self.analysis_state = ChannelState::Disconnected;

        self.teardown_audio().await;
        info!("streaming link disconnected");
    }

    /// Reset per-session counters. Called on upload after `disconnect_all`.
    pub fn reset(&mut self) {
        self.next_chunk_id = 0;
        self.next_live_seq.store(0, Ordering::SeqCst);
    }

    async fn teardown_audio(&mut self) {
        if let Some(task) = self.audio_read_task.take() {
            task.abort();
        }
        if let Some(task) = self.pump_task.take() {
            task.abort();
        }
        if let Some(sink) = self.audio_sink.take() {
            let _ = sink.lock().await.close().await;
        }
        // always release the underlying device/file, not just the pump
        if let Some(mut capture) = self.capture.take() {
            let _ = capture.stop().await;
        }
        self.audio_state = ChannelState::Disconnected;
    }

    fn spawn_analysis_reader(
        mut read: WsSource,
        events: mpsc::Sender<SessionEvent>,
        epoch: u64,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<AnalysisServerMessage>(&text) {
                            Ok(AnalysisServerMessage::RiskAnalysis {
                                risk_level,
                                risk_stage,
                                emotion,
                                analysis,
                            }) => {
                                let assessment = RiskAssessment {
                                    stage: RiskStage::parse(&risk_stage),
                                    score: risk_level.clamp(0.0, 100.0),
                                    emotion,
                                    rationale: analysis,
                                };
                                if events
                                    .send(SessionEvent::RiskPushed { epoch, assessment })
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Ok(AnalysisServerMessage::Pong) => debug!("analysis channel pong"),
                            Ok(AnalysisServerMessage::Error { error }) => {
                                let _ = events
                                    .send(SessionEvent::ChannelError {
                                        epoch,
                                        channel: ChannelKind::Analysis,
                                        message: error,
                                    })
                                    .await;
                            }
                            Err(err) => warn!("unparseable analysis message: {err}"),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        let _ = events
                            .send(SessionEvent::ChannelError {
                                epoch,
                                channel: ChannelKind::Analysis,
                                message: err.to_string(),
                            })
                            .await;
                        break;
                    }
                }
            }
            let _ = events
                .send(SessionEvent::ChannelClosed {
                    epoch,
                    channel: ChannelKind::Analysis,
                })
                .await;
        })
    }

    fn spawn_audio_reader(
        mut read: WsSource,
        events: mpsc::Sender<SessionEvent>,
        next_seq: Arc<AtomicU64>,
        epoch: u64,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<AudioStreamServerMessage>(&text) {
                            Ok(AudioStreamServerMessage::Transcription { text }) => {
                                let seq = next_seq.fetch_add(1, Ordering::SeqCst);
                                if events
                                    .send(SessionEvent::LiveTranscript { epoch, seq, text })
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Ok(AudioStreamServerMessage::Error { message }) => {
                                let _ = events
                                    .send(SessionEvent::ChannelError {
                                        epoch,
                                        channel: ChannelKind::AudioStream,
                                        message,
                                    })
                                    .await;
                            }
                            Err(err) => warn!("unparseable audio-stream message: {err}"),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        let _ = events
                            .send(SessionEvent::ChannelError {
                                epoch,
                                channel: ChannelKind::AudioStream,
                                message: err.to_string(),
                            })
                            .await;
                        break;
                    }
                }
            }
            let _ = events
                .send(SessionEvent::ChannelClosed {
                    epoch,
                    channel: ChannelKind::AudioStream,
                })
                .await;
        })
    }
}
