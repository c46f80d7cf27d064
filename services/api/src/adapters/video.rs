//! services/api/src/adapters/video.rs
//!
//! This module contains the adapter for the Video Lab explainer generator.
//! It implements the `VideoGenerationService` port from the `core` crate.

use async_trait::async_trait;
use lumina_core::domain::{VideoHandle, VideoStatus};
use lumina_core::ports::{PortError, PortResult, VideoGenerationService};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::openai_http::OpenAiHttp;

/// An adapter that implements `VideoGenerationService` using the OpenAI video endpoint.
#[derive(Clone)]
pub struct OpenAiVideoAdapter {
    http: OpenAiHttp,
    model: String,
}

#[derive(Serialize)]
struct VideoRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct VideoJob {
    id: String,
    status: String,
    #[serde(default)]
    error: Option<VideoJobError>,
}

#[derive(Debug, Deserialize)]
struct VideoJobError {
    message: String,
}

impl OpenAiVideoAdapter {
    pub fn new(http: OpenAiHttp, model: String) -> Self {
        Self { http, model }
    }

    /// Where the host serves a finished video back to the student.
    pub fn content_path(id: &str) -> String {
        format!("/videos/{}/content", id)
    }

    /// The upstream path for a job. Only plain ids are accepted, so a crafted
    /// id cannot reach other endpoints.
    fn job_path(id: &str, suffix: &str) -> PortResult<String> {
        let plain = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !plain {
            return Err(PortError::NotFound(format!("no video with id '{}'", id)));
        }
        Ok(format!("videos/{}{}", id, suffix))
    }

    fn to_status(job: VideoJob) -> PortResult<VideoStatus> {
        match job.status.as_str() {
            "completed" => Ok(VideoStatus {
                done: true,
                result_uri: Some(Self::content_path(&job.id)),
            }),
            "failed" => Err(PortError::Unexpected(
                job.error
                    .map(|e| e.message)
                    .unwrap_or_else(|| format!("video {} failed to render", job.id)),
            )),
            _ => Ok(VideoStatus {
                done: false,
                result_uri: None,
            }),
        }
    }
}

#[async_trait]
impl VideoGenerationService for OpenAiVideoAdapter {
    async fn start(&self, prompt: &str) -> PortResult<VideoHandle> {
        let request = VideoRequest {
            model: &self.model,
            prompt,
        };
        let job: VideoJob = self.http.post_json("videos", &request).await?;
        info!("Video job {} queued ({}).", job.id, job.status);
        Ok(VideoHandle { id: job.id })
    }

    async fn status(&self, handle: &VideoHandle) -> PortResult<VideoStatus> {
        let job: VideoJob = self.http.get_json(&Self::job_path(&handle.id, "")?).await?;
        Self::to_status(job)
    }

    async fn download(&self, handle: &VideoHandle) -> PortResult<Vec<u8>> {
        self.http.get_bytes(&Self::job_path(&handle.id, "/content")?).await
    }
}
