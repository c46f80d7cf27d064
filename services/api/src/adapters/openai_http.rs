//! services/api/src/adapters/openai_http.rs
//!
//! A thin authenticated HTTP client for the OpenAI calls made without the
//! `async-openai` client: images, videos and schema-constrained quizzes.

use lumina_core::ports::{PortError, PortResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAiHttp {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiHttp {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, OPENAI_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> PortResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(network_error)?;
        read_json(response).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PortResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(network_error)?;
        read_json(response).await
    }

    pub async fn get_bytes(&self, path: &str) -> PortResult<Vec<u8>> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await.map_err(network_error)?;
        Ok(bytes.to_vec())
    }
}

fn network_error(e: reqwest::Error) -> PortError {
    PortError::Network(e.to_string())
}

async fn check_status(response: reqwest::Response) -> PortResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("OpenAI request failed with {}: {}", status, body);
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(PortError::NotFound(body));
    }
    Err(PortError::Network(format!("{}: {}", status, body)))
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> PortResult<T> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| PortError::Unexpected(format!("unreadable response: {}", e)))
}
