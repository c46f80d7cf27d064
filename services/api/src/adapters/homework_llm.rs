//! services/api/src/adapters/homework_llm.rs
//!
//! This module contains the adapter for the Homework Hero tutor.
//! It implements the `HomeworkHelpService` port from the `core` crate.

const SYSTEM_INSTRUCTIONS: &str = r#"You are Lumina Study Buddy, a friendly homework helper for school students in Years 1-11.

Your role:
- NEVER give the final answer outright. Guide the student with hints, steps and questions so they get there themselves.
- Explain ideas simply, with a worked example on a *different* problem when that helps.
- Be warm and encouraging and use a few emojis.
- Put **key terms** in bold.
- Use the web search tool to check facts before you rely on them, and cite the pages you used as markdown links."#;

const FALLBACK_ANSWER: &str = "I couldn't find an answer for that. Try rephrasing!";

const DEFAULT_SOURCE_TITLE: &str = "Reference Source";

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::responses::{CreateResponseArgs, Tool, WebSearchTool},
    Client,
};
use async_trait::async_trait;
use lumina_core::domain::{GroundingSource, HomeworkAnswer};
use lumina_core::ports::{HomeworkHelpService, PortError, PortResult};
use regex::Regex;
use tracing::{debug, info};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `HomeworkHelpService` using the OpenAI Responses API with web search.
#[derive(Clone)]
pub struct OpenAiHomeworkAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiHomeworkAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Collects the pages the answer cites as markdown links, first occurrence of each URI wins.
    fn extract_sources(text: &str) -> PortResult<Vec<GroundingSource>> {
        let link_regex = Regex::new(r"\[([^\]]*)\]\((https?://[^)\s]+)\)")
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut sources: Vec<GroundingSource> = Vec::new();
        for caps in link_regex.captures_iter(text) {
            let uri = caps[2].to_string();
            if sources.iter().any(|s| s.uri == uri) {
                continue;
            }
            let title = caps[1].trim();
            sources.push(GroundingSource {
                title: if title.is_empty() {
                    DEFAULT_SOURCE_TITLE.to_string()
                } else {
                    title.to_string()
                },
                uri,
            });
        }
        Ok(sources)
    }
}

//=========================================================================================
// `HomeworkHelpService` Trait Implementation
//=========================================================================================

#[async_trait]
impl HomeworkHelpService for OpenAiHomeworkAdapter {
    async fn ask(&self, question: &str) -> PortResult<HomeworkAnswer> {
        debug!("Homework question: {}", question);

        let request = CreateResponseArgs::default()
            .model(&self.model)
            .instructions(SYSTEM_INSTRUCTIONS)
            .input(question.to_string())
            .tools(vec![Tool::WebSearch(WebSearchTool::default())])
            .max_output_tokens(1500u32)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .responses()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Network(e.to_string()))?;

        let text = response
            .output_text()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| FALLBACK_ANSWER.to_string());

        let sources = Self::extract_sources(&text)?;
        info!("Homework answer ready with {} sources.", sources.len());
        Ok(HomeworkAnswer { text, sources })
    }
}
