//! services/api/src/adapters/realtime.rs
//!
//! This module contains the adapter for the live voice tutor.
//! It implements the `RealtimeConnector` port from the `core` crate by holding a
//! websocket to the OpenAI realtime endpoint and exposing it as channels.

use async_trait::async_trait;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use lumina_core::audio::{AudioFrame, OUTPUT_SAMPLE_RATE};
use lumina_core::ports::{
    PortError, PortResult, RealtimeChannel, RealtimeConnector, RealtimeEvent, TutorSessionConfig,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// The session speaks PCM16 at one rate in both directions.
const SESSION_SAMPLE_RATE: u32 = OUTPUT_SAMPLE_RATE;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `RealtimeConnector` over the OpenAI realtime websocket.
#[derive(Clone)]
pub struct OpenAiRealtimeConnector {
    api_key: String,
    model: String,
    url: String,
}

impl OpenAiRealtimeConnector {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            url: REALTIME_URL.to_string(),
        }
    }
}

#[async_trait]
impl RealtimeConnector for OpenAiRealtimeConnector {
    async fn connect(&self, config: &TutorSessionConfig) -> PortResult<RealtimeChannel> {
        let url = format!("{}?model={}", self.url, self.model);
        let mut request = url
            .into_client_request()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        request.headers_mut().insert("Authorization", bearer);

        let (socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;
        let (mut write, mut read) = socket.split();

        write
            .send(Message::Text(session_update(config).to_string()))
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;
        info!("Realtime session opened with model {}.", self.model);

        let (outbound, mut outbound_rx) = mpsc::channel::<AudioFrame>(32);
        let (inbound_tx, inbound) = mpsc::channel::<RealtimeEvent>(64);
        let shutdown = CancellationToken::new();

        // --- Writer: microphone frames upstream ---
        let writer_token = shutdown.clone();
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = writer_token.cancelled() => break,
                    frame = outbound_rx.recv() => frame,
                };
                let Some(frame) = frame else { break };
                let event = append_audio(&resample(&frame, SESSION_SAMPLE_RATE));
                if let Err(e) = write.send(Message::Text(event.to_string())).await {
                    warn!("Failed to forward microphone audio: {}", e);
                    break;
                }
            }
            if let Err(e) = write.send(Message::Close(None)).await {
                debug!("Realtime socket already closed: {}", e);
            }
        });

        // --- Reader: tutor events downstream ---
        let reader_token = shutdown.clone();
        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    _ = reader_token.cancelled() => break,
                    message = read.next() => message,
                };
                let event = match message {
                    Some(Ok(Message::Text(text))) => match decode_server_event(&text) {
                        Some(event) => event,
                        None => continue,
                    },
                    Some(Ok(Message::Close(_))) | None => RealtimeEvent::Closed,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!("Realtime socket failed: {}", e);
                        RealtimeEvent::Error(e.to_string())
                    }
                };
                let finished = matches!(event, RealtimeEvent::Closed | RealtimeEvent::Error(_));
                if inbound_tx.send(event).await.is_err() || finished {
                    break;
                }
            }
            reader_token.cancel();
        });

        Ok(RealtimeChannel {
            outbound,
            inbound,
            shutdown,
        })
    }
}

//=========================================================================================
// Wire Encoding
//=========================================================================================

fn session_update(config: &TutorSessionConfig) -> serde_json::Value {
    json!({
        "type": "session.update",
        "session": {
            "type": "realtime",
            "instructions": config.system_prompt,
            "output_modalities": ["audio"],
            "audio": {
                "input": {
                    "format": { "type": "audio/pcm", "rate": SESSION_SAMPLE_RATE },
                    "transcription": { "model": "whisper-1" },
                    "turn_detection": { "type": "server_vad" }
                },
                "output": {
                    "format": { "type": "audio/pcm", "rate": SESSION_SAMPLE_RATE },
                    "voice": config.voice
                }
            }
        }
    })
}

fn append_audio(frame: &AudioFrame) -> serde_json::Value {
    json!({
        "type": "input_audio_buffer.append",
        "audio": base64::engine::general_purpose::STANDARD.encode(frame.to_le_bytes()),
    })
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// The server events the tutor cares about; everything else is ignored.
#[derive(Deserialize)]
#[serde(tag = "type")]
enum ServerEvent {
    #[serde(rename = "response.output_audio.delta", alias = "response.audio.delta")]
    AudioDelta { delta: String },
    #[serde(
        rename = "response.output_audio_transcript.done",
        alias = "response.audio_transcript.done"
    )]
    TutorTranscript { transcript: String },
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    StudentTranscript { transcript: String },
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    #[serde(rename = "error")]
    Error { error: ErrorBody },
    #[serde(other)]
    Other,
}

fn decode_server_event(text: &str) -> Option<RealtimeEvent> {
    let event = match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            warn!("Unreadable realtime event: {}", e);
            return None;
        }
    };
    match event {
        ServerEvent::AudioDelta { delta } => {
            match base64::engine::general_purpose::STANDARD.decode(delta) {
                Ok(bytes) => Some(RealtimeEvent::Audio(AudioFrame::from_le_bytes(
                    &bytes,
                    SESSION_SAMPLE_RATE,
                ))),
                Err(e) => {
                    warn!("Dropping undecodable audio delta: {}", e);
                    None
                }
            }
        }
        ServerEvent::TutorTranscript { transcript } => Some(RealtimeEvent::OutputTranscript(transcript)),
        ServerEvent::StudentTranscript { transcript } => Some(RealtimeEvent::InputTranscript(transcript)),
        ServerEvent::SpeechStarted => Some(RealtimeEvent::Interrupted),
        ServerEvent::Error { error } => Some(RealtimeEvent::Error(error.message)),
        ServerEvent::Other => None,
    }
}

/// Linear-interpolation resampling of a mono frame to `target_rate`.
pub fn resample(frame: &AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate || frame.sample_rate == 0 || frame.is_empty() {
        return AudioFrame::new(frame.samples.clone(), target_rate);
    }
    let ratio = frame.sample_rate as f64 / target_rate as f64;
    let out_len = ((frame.samples.len() as f64) / ratio).round() as usize;
    let last = frame.samples.len() - 1;
    let samples = (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let frac = pos - idx as f64;
            let s0 = frame.samples[idx] as f64;
            let s1 = frame.samples[(idx + 1).min(last)] as f64;
            (s0 + (s1 - s0) * frac).round() as i16
        })
        .collect();
    AudioFrame::new(samples, target_rate)
}
