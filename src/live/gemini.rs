//! Gemini Live WebSocket binding for the translation connection.
//!
//! Implements the bidirectional streaming protocol (BidiGenerateContent):
//!
//! 1. **Connect** — open the WebSocket to the Live endpoint
//! 2. **Setup** — send the session configuration (model, voice,
//!    transcription flags, translation instruction)
//! 3. **Stream** — send captured frames as `realtimeInput`, receive
//!    synthesized audio and transcript text as `serverContent`
//! 4. **Close** — close the WebSocket gracefully
//!
//! ## Binary frame quirk
//!
//! The server sends all messages as WebSocket Binary frames, including
//! JSON control messages like `setupComplete`. Binary frames starting
//! with `{` are parsed as JSON server messages.

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::{LiveConnection, LiveConnector, LiveEvent};
use crate::audio::EncodedFrame;
use crate::config::AppConfig;

// ── Constants ──────────────────────────────────────────────────────

/// Gemini Live WebSocket endpoint.
const LIVE_WS_URL: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Native-audio dialog model used for speech-to-speech translation.
const MODEL_ID: &str = "gemini-2.5-flash-preview-native-audio-dialog";

/// How long to wait for `setupComplete` before giving up.
const SETUP_TIMEOUT_SECS: u64 = 15;

// ── Setup message ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SetupMessage {
    pub setup: SetupPayload,
}

#[derive(Debug, Serialize)]
pub struct SetupPayload {
    pub model: String,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
    #[serde(rename = "systemInstruction")]
    pub system_instruction: SystemInstruction,
    #[serde(rename = "inputAudioTranscription", skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<EmptyObject>,
    #[serde(rename = "outputAudioTranscription", skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<EmptyObject>,
}

#[derive(Debug, Serialize)]
pub struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    pub response_modalities: Vec<String>,
    #[serde(rename = "speechConfig")]
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
pub struct SpeechConfig {
    #[serde(rename = "voiceConfig")]
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
pub struct VoiceConfig {
    #[serde(rename = "prebuiltVoiceConfig")]
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
pub struct PrebuiltVoiceConfig {
    #[serde(rename = "voiceName")]
    pub voice_name: String,
}

#[derive(Debug, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
pub struct TextPart {
    pub text: String,
}

/// Serializes as `{}` — the wire's way of enabling a transcription flag.
#[derive(Debug, Serialize)]
pub struct EmptyObject {}

/// Build the setup message for a translation session.
pub fn build_setup_message(config: &AppConfig) -> SetupMessage {
    SetupMessage {
        setup: SetupPayload {
            model: format!("models/{MODEL_ID}"),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: config.voice_name.clone(),
                        },
                    },
                },
            },
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: config.translation_instruction(),
                }],
            },
            input_audio_transcription: config.input_transcription.then_some(EmptyObject {}),
            output_audio_transcription: config.output_transcription.then_some(EmptyObject {}),
        },
    }
}

// ── Outbound messages ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RealtimeInputMessage {
    #[serde(rename = "realtimeInput")]
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Serialize)]
pub struct RealtimeInput {
    #[serde(rename = "mediaChunks")]
    pub media_chunks: Vec<MediaChunk>,
}

#[derive(Debug, Serialize)]
pub struct MediaChunk {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

/// Wrap one encoded capture frame for the wire.
pub fn build_frame_message(frame: EncodedFrame) -> RealtimeInputMessage {
    RealtimeInputMessage {
        realtime_input: RealtimeInput {
            media_chunks: vec![MediaChunk {
                mime_type: frame.mime_type,
                data: frame.data,
            }],
        },
    }
}

/// Wrap a manual text request as a complete client turn.
pub fn build_text_message(text: &str) -> serde_json::Value {
    serde_json::json!({
        "clientContent": {
            "turns": [{
                "role": "user",
                "parts": [{ "text": text }]
            }],
            "turnComplete": true,
        }
    })
}

// ── Server message parsing ─────────────────────────────────────────

/// Parse one JSON server message into events. A single message can
/// carry several (audio chunks plus transcription in the same frame).
pub fn parse_server_message(json_text: &str) -> Vec<LiveEvent> {
    let mut events = Vec::new();

    let value: serde_json::Value = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(e) => {
            events.push(LiveEvent::Error {
                message: format!("Unparseable server message: {e}"),
            });
            return events;
        }
    };

    if value.get("setupComplete").is_some() {
        events.push(LiveEvent::Opened);
    }

    if let Some(content) = value.get("serverContent") {
        if content.get("interrupted").and_then(|v| v.as_bool()) == Some(true) {
            events.push(LiveEvent::Interrupted);
        }
        if let Some(parts) = content
            .pointer("/modelTurn/parts")
            .and_then(|v| v.as_array())
        {
            for part in parts {
                // Audio stays base64 — the playback scheduler decodes it
                if let Some(data) = part.pointer("/inlineData/data").and_then(|v| v.as_str()) {
                    events.push(LiveEvent::AudioSegment {
                        data: data.to_string(),
                    });
                }
                if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                    events.push(LiveEvent::PartialText {
                        text: text.to_string(),
                    });
                }
            }
        }
        // turnComplete last: partials in the same message precede it
        if content.get("turnComplete").and_then(|v| v.as_bool()) == Some(true) {
            events.push(LiveEvent::TurnComplete);
        }
    }

    // outputTranscription: transcript of the model's synthesized speech
    if let Some(text) = value
        .pointer("/outputTranscription/text")
        .and_then(|v| v.as_str())
    {
        if !text.is_empty() {
            events.push(LiveEvent::PartialText {
                text: text.to_string(),
            });
        }
    }

    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown server error");
        events.push(LiveEvent::Error {
            message: message.to_string(),
        });
    }

    events
}

// ── Connection ─────────────────────────────────────────────────────

/// Messages queued for the outbound WebSocket task.
#[derive(Debug)]
enum Outbound {
    Frame(EncodedFrame),
    Text(String),
    Close,
}

/// An open Gemini Live connection.
///
/// Created by [`GeminiLiveConnection::connect`], which returns only
/// after `setupComplete` — the remote "open" signal.
pub struct GeminiLiveConnection {
    outbound_tx: mpsc::Sender<Outbound>,
    event_rx: Arc<Mutex<mpsc::Receiver<LiveEvent>>>,
    session_id: String,
}

impl GeminiLiveConnection {
    /// Connect, send setup, and wait for `setupComplete`.
    pub async fn connect(api_key: &str, config: &AppConfig) -> anyhow::Result<Self> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{LIVE_WS_URL}?key={api_key}");

        tracing::info!(
            session_id = %session_id,
            model = MODEL_ID,
            source = config.source_language.as_str(),
            target = config.target_language.as_str(),
            "Connecting to live translation service"
        );

        let (mut ws_stream, _response) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect: {e}"))?;

        let setup = build_setup_message(config);
        let setup_json = serde_json::to_string(&setup)?;
        ws_stream
            .send(WsMessage::Text(setup_json.into()))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send setup message: {e}"))?;

        // Wait for setupComplete before splitting the stream. All server
        // messages arrive as Binary frames, JSON included.
        let setup_timeout = std::time::Duration::from_secs(SETUP_TIMEOUT_SECS);
        let handshake = tokio::time::timeout(setup_timeout, async {
            while let Some(msg) = ws_stream.next().await {
                match msg {
                    Ok(WsMessage::Binary(data)) if data.first() == Some(&b'{') => {
                        if let Ok(text) = std::str::from_utf8(&data) {
                            if text.contains("setupComplete") {
                                return Ok(());
                            }
                        }
                    }
                    Ok(WsMessage::Text(text)) if text.contains("setupComplete") => {
                        return Ok(());
                    }
                    Ok(WsMessage::Close(frame)) => {
                        anyhow::bail!("Connection closed before setupComplete: {frame:?}");
                    }
                    Err(e) => anyhow::bail!("WebSocket error before setupComplete: {e}"),
                    _ => {}
                }
            }
            anyhow::bail!("Stream ended before setupComplete")
        })
        .await;

        match handshake {
            Ok(Ok(())) => {
                tracing::info!(session_id = %session_id, "Live session ready to stream");
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => anyhow::bail!("setupComplete timeout ({SETUP_TIMEOUT_SECS}s)"),
        }

        let (ws_sender, ws_receiver) = ws_stream.split();

        let (outbound_tx, outbound_rx) = mpsc::channel::<Outbound>(256);
        let (event_tx, event_rx) = mpsc::channel::<LiveEvent>(256);

        let sid_out = session_id.clone();
        tokio::spawn(async move {
            outbound_loop(outbound_rx, ws_sender, sid_out).await;
        });

        let sid_in = session_id.clone();
        tokio::spawn(async move {
            inbound_loop(ws_receiver, event_tx, sid_in).await;
        });

        Ok(Self {
            outbound_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
            session_id,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait::async_trait]
impl LiveConnection for GeminiLiveConnection {
    async fn send_frame(&self, frame: EncodedFrame) -> anyhow::Result<()> {
        self.outbound_tx
            .send(Outbound::Frame(frame))
            .await
            .map_err(|_| anyhow::anyhow!("Outbound channel closed"))
    }

    async fn send_text(&self, text: &str) -> anyhow::Result<()> {
        self.outbound_tx
            .send(Outbound::Text(text.to_string()))
            .await
            .map_err(|_| anyhow::anyhow!("Outbound channel closed"))
    }

    async fn recv_event(&self) -> Option<LiveEvent> {
        self.event_rx.lock().await.recv().await
    }

    async fn close(&self) {
        let _ = self.outbound_tx.send(Outbound::Close).await;
    }
}

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    WsMessage,
>;
type WsSource = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// Serialize queued outbound messages onto the WebSocket.
async fn outbound_loop(mut rx: mpsc::Receiver<Outbound>, mut sink: WsSink, session_id: String) {
    let mut frame_count: u64 = 0;

    while let Some(msg) = rx.recv().await {
        let json = match msg {
            Outbound::Frame(frame) => {
                frame_count += 1;
                if frame_count == 1 || frame_count % 100 == 0 {
                    tracing::debug!(
                        session_id = %session_id,
                        frame = frame_count,
                        "Streaming capture frames"
                    );
                }
                match serde_json::to_string(&build_frame_message(frame)) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(session_id = %session_id, error = %e, "Failed to serialize frame");
                        continue;
                    }
                }
            }
            Outbound::Text(text) => {
                tracing::info!(session_id = %session_id, "Sending text translation request");
                match serde_json::to_string(&build_text_message(&text)) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(session_id = %session_id, error = %e, "Failed to serialize text turn");
                        continue;
                    }
                }
            }
            Outbound::Close => {
                let _ = sink.send(WsMessage::Close(None)).await;
                break;
            }
        };

        if sink.send(WsMessage::Text(json.into())).await.is_err() {
            tracing::warn!(session_id = %session_id, "WebSocket send failed, closing outbound loop");
            break;
        }
    }

    tracing::debug!(session_id = %session_id, "Outbound loop terminated");
}

/// Parse inbound WebSocket frames and dispatch events.
async fn inbound_loop(mut source: WsSource, event_tx: mpsc::Sender<LiveEvent>, session_id: String) {
    while let Some(msg) = source.next().await {
        let text = match &msg {
            Ok(WsMessage::Text(text)) => Some(text.as_str()),
            // JSON-in-Binary: everything the server sends
            Ok(WsMessage::Binary(data)) if data.first() == Some(&b'{') => {
                std::str::from_utf8(data).ok()
            }
            Ok(WsMessage::Binary(data)) => {
                tracing::warn!(
                    session_id = %session_id,
                    len = data.len(),
                    "Unexpected non-JSON binary frame — skipping"
                );
                None
            }
            Ok(WsMessage::Close(frame)) => {
                tracing::info!(session_id = %session_id, close_frame = ?frame, "Live connection closed");
                let _ = event_tx.send(LiveEvent::Closed).await;
                break;
            }
            Ok(_) => None, // ping/pong handled by tungstenite
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Live WebSocket error");
                let _ = event_tx
                    .send(LiveEvent::Error {
                        message: format!("WebSocket error: {e}"),
                    })
                    .await;
                break;
            }
        };

        if let Some(text) = text {
            for event in parse_server_message(text) {
                if event_tx.send(event).await.is_err() {
                    tracing::debug!(session_id = %session_id, "Event receiver dropped, closing inbound loop");
                    return;
                }
            }
        }
    }

    tracing::debug!(session_id = %session_id, "Inbound loop terminated");
}

// ── Connector ──────────────────────────────────────────────────────

/// Opens Gemini Live connections with a fixed API key.
pub struct GeminiConnector {
    api_key: String,
}

impl GeminiConnector {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }
}

#[async_trait::async_trait]
impl LiveConnector for GeminiConnector {
    async fn connect(&self, config: &AppConfig) -> anyhow::Result<Box<dyn LiveConnection>> {
        let connection = GeminiLiveConnection::connect(&self.api_key, config).await?;
        Ok(Box::new(connection))
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn test_config() -> AppConfig {
        AppConfig::default()
    }

    #[test]
    fn setup_message_carries_model_and_modality() {
        let msg = build_setup_message(&test_config());
        assert!(msg.setup.model.contains("gemini"));
        assert_eq!(msg.setup.generation_config.response_modalities, vec!["AUDIO"]);
    }

    #[test]
    fn setup_message_serializes_instruction_and_flags() {
        let json = serde_json::to_string(&build_setup_message(&test_config())).unwrap();
        assert!(json.contains("\"setup\""));
        assert!(json.contains("systemInstruction"));
        assert!(json.contains("translator"));
        // Default: output transcription on, input transcription off
        assert!(json.contains("outputAudioTranscription"));
        assert!(!json.contains("inputAudioTranscription"));
    }

    #[test]
    fn setup_message_names_the_voice() {
        let mut config = test_config();
        config.voice_name = "Puck".into();
        let json = serde_json::to_string(&build_setup_message(&config)).unwrap();
        assert!(json.contains("\"voiceName\":\"Puck\""));
    }

    #[test]
    fn frame_message_wire_shape() {
        let frame = EncodedFrame {
            mime_type: "audio/pcm;rate=16000".into(),
            data: base64::engine::general_purpose::STANDARD.encode([0u8, 1, 2, 3]),
        };
        let json = serde_json::to_string(&build_frame_message(frame)).unwrap();
        assert!(json.contains("realtimeInput"));
        assert!(json.contains("mediaChunks"));
        assert!(json.contains("audio/pcm;rate=16000"));
    }

    #[test]
    fn text_message_is_a_complete_turn() {
        let json = serde_json::to_string(&build_text_message("bonjour")).unwrap();
        assert!(json.contains("clientContent"));
        assert!(json.contains("bonjour"));
        assert!(json.contains("\"turnComplete\":true"));
    }

    #[test]
    fn parse_setup_complete_as_opened() {
        let events = parse_server_message(r#"{"setupComplete": {}}"#);
        assert_eq!(events, vec![LiveEvent::Opened]);
    }

    #[test]
    fn parse_turn_complete() {
        let events = parse_server_message(r#"{"serverContent": {"turnComplete": true}}"#);
        assert!(events.contains(&LiveEvent::TurnComplete));
    }

    #[test]
    fn parse_interrupted() {
        let events = parse_server_message(r#"{"serverContent": {"interrupted": true}}"#);
        assert!(events.contains(&LiveEvent::Interrupted));
    }

    #[test]
    fn parse_audio_segment_keeps_base64() {
        let b64 = base64::engine::general_purpose::STANDARD.encode([10u8, 20, 30]);
        let json = format!(
            r#"{{"serverContent": {{"modelTurn": {{"parts": [{{"inlineData": {{"mimeType": "audio/pcm;rate=24000", "data": "{b64}"}}}}]}}}}}}"#
        );
        let events = parse_server_message(&json);
        assert_eq!(
            events,
            vec![LiveEvent::AudioSegment { data: b64 }],
            "audio payload must stay base64-encoded"
        );
    }

    #[test]
    fn parse_model_text_as_partial() {
        let events =
            parse_server_message(r#"{"serverContent": {"modelTurn": {"parts": [{"text": "Hola"}]}}}"#);
        assert_eq!(
            events,
            vec![LiveEvent::PartialText {
                text: "Hola".into()
            }]
        );
    }

    #[test]
    fn parse_output_transcription_as_partial() {
        let events = parse_server_message(r#"{"outputTranscription": {"text": "Hello"}}"#);
        assert_eq!(
            events,
            vec![LiveEvent::PartialText {
                text: "Hello".into()
            }]
        );
    }

    #[test]
    fn parse_empty_transcription_ignored() {
        let events = parse_server_message(r#"{"outputTranscription": {"text": ""}}"#);
        assert!(events.is_empty());
    }

    #[test]
    fn partials_precede_turn_complete_in_one_message() {
        let json = r#"{"serverContent": {"turnComplete": true, "modelTurn": {"parts": [{"text": "fin"}]}}}"#;
        let events = parse_server_message(json);
        assert_eq!(
            events,
            vec![
                LiveEvent::PartialText { text: "fin".into() },
                LiveEvent::TurnComplete
            ]
        );
    }

    #[test]
    fn parse_error_message() {
        let events = parse_server_message(r#"{"error": {"message": "Quota exceeded"}}"#);
        assert!(matches!(
            &events[0],
            LiveEvent::Error { message } if message.contains("Quota")
        ));
    }

    #[test]
    fn parse_invalid_json_yields_error_event() {
        let events = parse_server_message("not json");
        assert!(matches!(&events[0], LiveEvent::Error { .. }));
    }
}
