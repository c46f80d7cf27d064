//! services/api/src/adapters/images.rs
//!
//! This module contains the adapter for the Visual Lab diagram generator.
//! It implements the `DiagramService` port from the `core` crate.

use async_trait::async_trait;
use base64::Engine;
use lumina_core::domain::AspectRatio;
use lumina_core::ports::{DiagramService, PortError, PortResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::openai_http::OpenAiHttp;

/// An adapter that implements `DiagramService` using the OpenAI image endpoint.
#[derive(Clone)]
pub struct OpenAiImageAdapter {
    http: OpenAiHttp,
    model: String,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'static str,
    n: u8,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

impl OpenAiImageAdapter {
    pub fn new(http: OpenAiHttp, model: String) -> Self {
        Self { http, model }
    }

    /// Closest size the image model supports for each aspect ratio.
    fn size_for(aspect_ratio: AspectRatio) -> &'static str {
        match aspect_ratio {
            AspectRatio::Square => "1024x1024",
            AspectRatio::Landscape => "1536x1024",
            AspectRatio::Portrait => "1024x1536",
        }
    }

    /// Wraps base64 PNG data as a URL an `<img>` tag can show directly.
    fn data_url(b64: &str) -> PortResult<String> {
        base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| PortError::Unexpected(format!("image data is not base64: {}", e)))?;
        Ok(format!("data:image/png;base64,{}", b64))
    }
}

#[async_trait]
impl DiagramService for OpenAiImageAdapter {
    async fn generate_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> PortResult<String> {
        let request = ImageRequest {
            model: &self.model,
            prompt,
            size: Self::size_for(aspect_ratio),
            n: 1,
        };
        let response: ImageResponse = self.http.post_json("images/generations", &request).await?;
        let b64 = response
            .data
            .into_iter()
            .find_map(|d| d.b64_json)
            .ok_or_else(|| PortError::Unexpected("the image model returned no image".to_string()))?;
        info!("Generated a {:?} diagram.", aspect_ratio);
        Self::data_url(&b64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratios_pick_matching_sizes() {
        assert_eq!(OpenAiImageAdapter::size_for(AspectRatio::Square), "1024x1024");
        assert_eq!(OpenAiImageAdapter::size_for(AspectRatio::Landscape), "1536x1024");
        assert_eq!(OpenAiImageAdapter::size_for(AspectRatio::Portrait), "1024x1536");
    }

    #[test]
    fn data_url_requires_base64() {
        assert_eq!(
            OpenAiImageAdapter::data_url("iVBORw0KGgo=").unwrap(),
            "data:image/png;base64,iVBORw0KGgo="
        );
        assert!(OpenAiImageAdapter::data_url("not base64!").is_err());
    }
}
