//! crates/lumina_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the storage backend, the AI vendor and the audio devices.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::audio::AudioFrame;
use crate::domain::{
    AspectRatio, HomeworkAnswer, QuizQuestion, VideoHandle, VideoStatus,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (storage, network, devices).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A generative or realtime API call failed. Safe to retry by hand.
    #[error("Network error: {0}")]
    Network(String),
    #[error("Microphone access was denied")]
    PermissionDenied,
    #[error("Connection interrupted: {0}")]
    ConnectionInterrupted(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage and Time Ports
//=========================================================================================

/// String-keyed persistence, the server-side stand-in for browser local storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;
}

/// Wall-clock source for creation timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

//=========================================================================================
// Generative AI Ports
//=========================================================================================

#[async_trait]
pub trait HomeworkHelpService: Send + Sync {
    /// Guides the student towards an answer without giving it away.
    async fn ask(&self, question: &str) -> PortResult<HomeworkAnswer>;
}

#[async_trait]
pub trait PracticeGenerationService: Send + Sync {
    /// Writes a multiple-choice quiz pitched at the student's year group.
    async fn generate_quiz(&self, topic: &str, year_group: &str) -> PortResult<Vec<QuizQuestion>>;

    /// Writes a printable markdown worksheet with an answer key.
    async fn generate_worksheet(&self, topic: &str, year_group: &str) -> PortResult<String>;
}

#[async_trait]
pub trait DiagramService: Send + Sync {
    /// Renders an image and returns it as a URL the client can display directly.
    async fn generate_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> PortResult<String>;
}

#[async_trait]
pub trait VideoGenerationService: Send + Sync {
    async fn start(&self, prompt: &str) -> PortResult<VideoHandle>;

    async fn status(&self, handle: &VideoHandle) -> PortResult<VideoStatus>;

    /// Fetches the rendered MP4 of a finished job.
    async fn download(&self, handle: &VideoHandle) -> PortResult<Vec<u8>>;
}

//=========================================================================================
// Realtime Audio Ports
//=========================================================================================

/// Fixed settings sent when a tutoring session is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorSessionConfig {
    pub system_prompt: String,
    pub voice: String,
}

/// A live microphone. Frames arrive on `frames` until the capture is released.
pub struct MicrophoneCapture {
    pub frames: mpsc::Receiver<AudioFrame>,
}

pub trait Microphone: Send + Sync {
    /// Requests access and starts capturing. Fails with `PermissionDenied` when refused.
    fn open(&self) -> PortResult<MicrophoneCapture>;

    /// Stops capturing and gives the device back. Must be safe to call repeatedly.
    fn release(&self);
}

/// Something the remote conversational endpoint told us.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// Synthesized speech to play.
    Audio(AudioFrame),
    /// Partial transcript of what the student said.
    InputTranscript(String),
    /// Partial transcript of what the tutor said.
    OutputTranscript(String),
    /// The student talked over the tutor; drop queued speech.
    Interrupted,
    Error(String),
    Closed,
}

/// An open session with the conversational endpoint, expressed as channels.
pub struct RealtimeChannel {
    /// Microphone frames to forward upstream.
    pub outbound: mpsc::Sender<AudioFrame>,
    pub inbound: mpsc::Receiver<RealtimeEvent>,
    /// Cancelling this closes the remote session.
    pub shutdown: CancellationToken,
}

#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(&self, config: &TutorSessionConfig) -> PortResult<RealtimeChannel>;
}

/// Identifies one scheduled playback source.
pub type SourceId = u64;

/// The speaker side of the audio output context.
pub trait PlaybackSink: Send + Sync {
    /// Queues `frame` to start at `start_at` on the output timeline.
    fn play(&self, id: SourceId, frame: &AudioFrame, start_at: Duration);

    /// Stops a source immediately, whether it has started or not.
    fn stop(&self, id: SourceId);
}

/// Current position of the output context's timeline.
pub trait PlaybackClock: Send + Sync {
    fn now(&self) -> Duration;
}
