use serde::{Deserialize, Serialize};

/// Response from `POST /transcribe`.
#[derive(Debug, Deserialize)]
pub struct TranscribeResponse {
    pub success: bool,
    #[serde(default)]
    pub text: Option<String>,
}

/// JSON body for the text-consuming endpoints (`/summarize`,
/// `/generate-script`, `/analyze-risk`).
#[derive(Debug, Serialize)]
pub struct TextRequest<'a> {
    pub text: &'a str,
}

/// Response from `POST /summarize`. Older backend builds answer with a
/// `text` field instead of `summary`; both are accepted.
#[derive(Debug, Deserialize)]
pub struct SummarizeResponse {
    pub success: bool,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl SummarizeResponse {
    pub fn into_summary(self) -> Option<String> {
        self.summary.or(self.text)
    }
}

/// Response from `POST /generate-script`.
#[derive(Debug, Deserialize)]
pub struct ScriptResponse {
    pub success: bool,
    #[serde(default)]
    pub script: Option<String>,
}

/// Response from `POST /analyze-risk`.
#[derive(Debug, Deserialize)]
pub struct RiskResponse {
    pub success: bool,
    #[serde(default)]
    pub risk_level: f32,
    #[serde(default)]
    pub risk_stage: String,
    #[serde(default)]
    pub emotion: String,
    #[serde(default)]
    pub analysis: String,
}

/// Client → server messages on `ws/real-time-analysis`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisClientMessage {
    TextChunk { text: String, chunk_id: u64 },
}

/// Server → client messages on `ws/real-time-analysis`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisServerMessage {
    RiskAnalysis {
        #[serde(default)]
        risk_level: f32,
        #[serde(default)]
        risk_stage: String,
        #[serde(default)]
        emotion: String,
        #[serde(default)]
        analysis: String,
    },
    Pong,
    Error {
        error: String,
    },
}

/// Server → client messages on `ws/audio-stream`. The client side of this
/// channel is raw binary audio, not JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AudioStreamServerMessage {
    Transcription { text: String },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_messages_round_trip_the_wire_shape() {
        let msg = AnalysisClientMessage::TextChunk {
            text: "결제가 안돼요".to_string(),
            chunk_id: 3,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "text_chunk");
        assert_eq!(json["chunk_id"], 3);

        let parsed: AnalysisServerMessage = serde_json::from_str(
            r#"{"type":"risk_analysis","risk_level":72,"risk_stage":"경고","emotion":"분노","analysis":"고압적인 요구"}"#,
        )
        .unwrap();
        match parsed {
            AnalysisServerMessage::RiskAnalysis {
                risk_level,
                risk_stage,
                ..
            } => {
                assert_eq!(risk_level, 72.0);
                assert_eq!(risk_stage, "경고");
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let pong: AnalysisServerMessage = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
        assert!(matches!(pong, AnalysisServerMessage::Pong));
    }

    #[test]
    fn summarize_response_accepts_legacy_text_field() {
        let legacy: SummarizeResponse =
            serde_json::from_str(r#"{"success":true,"text":"요약"}"#).unwrap();
        assert_eq!(legacy.into_summary().as_deref(), Some("요약"));
    }
}
