//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for the live voice tutor.

use lumina_core::audio::{BridgeStatus, TranscriptEntry};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================
// NOTE: Microphone audio is sent as raw Binary frames of little-endian PCM16 at 16kHz,
// not as part of this enum.
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens a tutoring session. `microphone_granted` reports the browser's permission prompt.
    Start { microphone_granted: bool },

    /// Ends the tutoring session; the socket stays open for another start.
    Stop,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================
// NOTE: The tutor's voice is sent as raw Binary frames of PCM16, each one preceded by
// a `PlayScheduled` message describing when to play it.
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The session went live or returned to idle.
    Status { status: BridgeStatus },

    /// A new line in the conversation transcript.
    Transcript { entry: TranscriptEntry },

    /// The next binary frame starts at `start_at_ms` on the socket's timeline.
    PlayScheduled {
        source_id: u64,
        start_at_ms: u64,
        sample_rate: u32,
    },

    /// Stop a scheduled or playing source right away.
    StopSource { source_id: u64 },

    /// The student talked over the tutor and queued speech was discarded.
    Interrupted,

    /// Reports a recoverable error to the client, which should display a message.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_core::audio::Speaker;

    #[test]
    fn client_messages_are_tagged() {
        let start: ClientMessage =
            serde_json::from_str(r#"{"type":"start","microphone_granted":true}"#).unwrap();
        assert_eq!(start, ClientMessage::Start { microphone_granted: true });
        let stop: ClientMessage = serde_json::from_str(r#"{"type":"stop"}"#).unwrap();
        assert_eq!(stop, ClientMessage::Stop);
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"pause"}"#).is_err());
    }

    #[test]
    fn server_messages_are_tagged() {
        let status = serde_json::to_value(ServerMessage::Status { status: BridgeStatus::Active }).unwrap();
        assert_eq!(status, serde_json::json!({"type": "status", "status": "active"}));

        let line = ServerMessage::Transcript {
            entry: TranscriptEntry { speaker: Speaker::Tutor, text: "Good try!".into() },
        };
        assert_eq!(
            serde_json::to_value(line).unwrap(),
            serde_json::json!({"type": "transcript", "entry": {"speaker": "tutor", "text": "Good try!"}})
        );

        let play = serde_json::to_value(ServerMessage::PlayScheduled {
            source_id: 2,
            start_at_ms: 250,
            sample_rate: 24_000,
        })
        .unwrap();
        assert_eq!(play["type"], "play_scheduled");
        assert_eq!(play["start_at_ms"], 250);
    }
}
