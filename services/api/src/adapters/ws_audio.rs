//! services/api/src/adapters/ws_audio.rs
//!
//! Audio device adapters for one tutor websocket: the browser's microphone
//! arrives as binary frames, and scheduled speech is sent back the same way.

use bytes::Bytes;
use lumina_core::audio::AudioFrame;
use lumina_core::ports::{
    Microphone, MicrophoneCapture, PlaybackClock, PlaybackSink, PortError, PortResult, SourceId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;

use crate::web::protocol::ServerMessage;

const CAPTURE_BUFFER: usize = 16;

/// What the socket writer task sends to the browser.
#[derive(Debug)]
pub enum Outgoing {
    Message(ServerMessage),
    Audio(Bytes),
}

//=========================================================================================
// Microphone
//=========================================================================================

/// The browser microphone, fed by binary frames on the tutor socket.
#[derive(Default)]
pub struct WsMicrophone {
    granted: AtomicBool,
    feed: Mutex<Option<mpsc::Sender<AudioFrame>>>,
}

impl WsMicrophone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records whether the browser was allowed to capture audio.
    pub fn set_permission(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    /// Hands a captured frame to the open capture. Frames arriving while closed
    /// or faster than they are forwarded are dropped.
    pub fn push(&self, frame: AudioFrame) {
        let feed = self.feed.lock().unwrap_or_else(PoisonError::into_inner);
        match feed.as_ref() {
            Some(tx) => {
                if tx.try_send(frame).is_err() {
                    debug!("Dropping a microphone frame, capture is busy or closed.");
                }
            }
            None => debug!("Dropping a microphone frame, capture is not open."),
        }
    }
}

impl Microphone for WsMicrophone {
    fn open(&self) -> PortResult<MicrophoneCapture> {
        if !self.granted.load(Ordering::SeqCst) {
            return Err(PortError::PermissionDenied);
        }
        let (tx, frames) = mpsc::channel(CAPTURE_BUFFER);
        *self.feed.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        Ok(MicrophoneCapture { frames })
    }

    fn release(&self) {
        self.feed.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

//=========================================================================================
// Speaker
//=========================================================================================

/// Forwards scheduled speech to the browser, which owns the actual audio output.
pub struct WsPlaybackSink {
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl WsPlaybackSink {
    pub fn new(outgoing: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self { outgoing }
    }

    fn send(&self, item: Outgoing) {
        if self.outgoing.send(item).is_err() {
            debug!("Tutor socket is gone, dropping playback instruction.");
        }
    }
}

impl PlaybackSink for WsPlaybackSink {
    fn play(&self, id: SourceId, frame: &AudioFrame, start_at: Duration) {
        self.send(Outgoing::Message(ServerMessage::PlayScheduled {
            source_id: id,
            start_at_ms: start_at.as_millis() as u64,
            sample_rate: frame.sample_rate,
        }));
        self.send(Outgoing::Audio(Bytes::from(frame.to_le_bytes())));
    }

    fn stop(&self, id: SourceId) {
        self.send(Outgoing::Message(ServerMessage::StopSource { source_id: id }));
    }
}

/// Milliseconds since the socket opened; the browser keeps the same origin.
pub struct InstantClock {
    origin: Instant,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock for InstantClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}
