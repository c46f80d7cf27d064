//! crates/lumina_core/src/audio/mod.rs
//!
//! Realtime voice tutoring: frames, playback scheduling, the rolling transcript
//! and the bridge that ties them to the remote tutor.

pub mod bridge;
pub mod frame;
pub mod scheduler;
pub mod transcript;

pub use bridge::{
    BridgeDevices, BridgeError, BridgeEvent, BridgeStatus, RealtimeAudioBridge,
    DEFAULT_TUTOR_VOICE, TUTOR_SYSTEM_PROMPT,
};
pub use frame::{AudioFrame, CAPTURE_FRAME_SAMPLES, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
pub use scheduler::{PlaybackScheduler, Scheduled};
pub use transcript::{Speaker, TranscriptEntry, TranscriptLog, TRANSCRIPT_CAPACITY};
