//! crates/lumina_core/src/generation.rs
//!
//! Small pieces of logic shared by the generative screens.

use std::time::Duration;
use tracing::{debug, info};

use crate::domain::{VideoHandle, VideoStatus};
use crate::ports::{PortError, PortResult, VideoGenerationService};

/// Wraps a student's request so the image model draws a labelled teaching diagram.
pub fn diagram_prompt(subject: &str) -> String {
    format!(
        "A clear, high-quality educational diagram or visual aid showing: {}. \
         Educational style, textbook quality, white background where appropriate, labeled clearly.",
        subject.trim()
    )
}

/// Topics offered as one-click ideas in the diagram lab.
pub const SUGGESTED_DIAGRAMS: [&str; 5] = [
    "Structure of an atom",
    "Water cycle diagram",
    "Plate tectonics",
    "Ancient Egyptian pyramid layout",
    "Newton's Third Law illustration",
];

/// Polls a video job every `interval` until it reports done, giving up after `max_polls`.
///
/// Errors from `status` are returned immediately; nothing is retried.
pub async fn wait_for_video(
    service: &dyn VideoGenerationService,
    handle: &VideoHandle,
    interval: Duration,
    max_polls: u32,
) -> PortResult<VideoStatus> {
    for attempt in 1..=max_polls {
        let status = service.status(handle).await?;
        if status.done {
            info!("Video {} finished after {} polls.", handle.id, attempt);
            return Ok(status);
        }
        debug!("Video {} still rendering (poll {}/{}).", handle.id, attempt, max_polls);
        if attempt < max_polls {
            tokio::time::sleep(interval).await;
        }
    }
    Err(PortError::Network(format!(
        "video {} did not finish after {} polls",
        handle.id, max_polls
    )))
}
