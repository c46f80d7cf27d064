//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a tutor WebSocket connection.
//! Each socket owns one realtime audio bridge; the browser supplies the microphone
//! and plays back what the bridge schedules.

use crate::adapters::ws_audio::{InstantClock, Outgoing, WsMicrophone, WsPlaybackSink};
use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{SinkExt, StreamExt};
use lumina_core::audio::{
    AudioFrame, BridgeDevices, BridgeEvent, RealtimeAudioBridge, INPUT_SAMPLE_RATE,
};
use lumina_core::ports::TutorSessionConfig;
use lumina_core::User;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user: User) {
    info!("Tutor socket opened for {}.", user.name);
    let (mut sender, mut receiver) = socket.split();

    // --- 1. Writer: everything bound for the browser goes through one queue ---
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outgoing>();
    let writer = tokio::spawn(async move {
        while let Some(item) = out_rx.recv().await {
            let message = match item {
                Outgoing::Message(msg) => match serde_json::to_string(&msg) {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        error!("Failed to encode {:?}: {}", msg, e);
                        continue;
                    }
                },
                Outgoing::Audio(pcm) => Message::Binary(pcm),
            };
            if sender.send(message).await.is_err() {
                debug!("Tutor socket closed while sending.");
                break;
            }
        }
    });

    // --- 2. The bridge and its devices ---
    let microphone = Arc::new(WsMicrophone::new());
    let bridge = RealtimeAudioBridge::new(
        BridgeDevices {
            microphone: microphone.clone(),
            connector: app_state.realtime.clone(),
            sink: Arc::new(WsPlaybackSink::new(out_tx.clone())),
            clock: Arc::new(InstantClock::new()),
        },
        TutorSessionConfig::socratic_tutor(app_state.config.tutor_voice.clone()),
    );

    let forwarder = {
        let mut events = bridge.subscribe();
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if out_tx.send(Outgoing::Message(to_server_message(event))).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Tutor socket fell behind, skipped {} events.", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    // --- 3. Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Start { microphone_granted }) => {
                    microphone.set_permission(microphone_granted);
                    if let Err(e) = bridge.start().await {
                        warn!("Tutor session for {} did not start: {}", user.name, e);
                    }
                }
                Ok(ClientMessage::Stop) => bridge.stop().await,
                Err(e) => {
                    warn!("Ignoring unreadable client message: {}", e);
                    let _ = out_tx.send(Outgoing::Message(ServerMessage::Error {
                        message: format!("Unrecognised message: {}", e),
                    }));
                }
            },
            Message::Binary(data) => {
                microphone.push(AudioFrame::from_le_bytes(&data, INPUT_SAMPLE_RATE));
            }
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- 4. Cleanup ---
    bridge.stop().await;
    drop(bridge);
    forwarder.abort();
    writer.abort();
    info!("Tutor socket closed for {}.", user.name);
}

fn to_server_message(event: BridgeEvent) -> ServerMessage {
    match event {
        BridgeEvent::Status(status) => ServerMessage::Status { status },
        BridgeEvent::Transcript(entry) => ServerMessage::Transcript { entry },
        BridgeEvent::Interrupted => ServerMessage::Interrupted,
        BridgeEvent::Error(e) => ServerMessage::Error {
            message: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_core::audio::{BridgeError, BridgeStatus};

    #[test]
    fn bridge_events_become_server_messages() {
        assert_eq!(
            to_server_message(BridgeEvent::Status(BridgeStatus::Idle)),
            ServerMessage::Status { status: BridgeStatus::Idle }
        );
        assert_eq!(
            to_server_message(BridgeEvent::Error(BridgeError::PermissionDenied)),
            ServerMessage::Error { message: "microphone access was denied".to_string() }
        );
        assert_eq!(to_server_message(BridgeEvent::Interrupted), ServerMessage::Interrupted);
    }
}
