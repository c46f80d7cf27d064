//! services/api/src/adapters/practice_llm.rs
//!
//! This module contains the adapter for the Practice Zone generator.
//! It implements the `PracticeGenerationService` port from the `core` crate:
//! structured multiple-choice quizzes and printable markdown worksheets.
//!
//! Quizzes are requested with a strict `json_schema` text format, sent as raw
//! Responses JSON over `OpenAiHttp`; worksheets go through the `async-openai` client.

const QUIZ_INSTRUCTIONS: &str = r#"You write practice quizzes for school students.

Rules:
- Every question has exactly four options.
- "correctAnswer" is copied word for word from one of the options.
- "explanation" is one or two friendly sentences saying why the answer is right."#;

const WORKSHEET_INSTRUCTIONS: &str = r#"You write printable revision worksheets for school students, formatted in markdown.

Every worksheet contains, in this order:
1. A 2-sentence summary of the topic.
2. 5 short-answer questions.
3. 1 fun "Challenge" question.
4. An answer key at the very bottom.

Use markdown headings for each section and a few emojis to keep it fun."#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::responses::CreateResponseArgs,
    Client,
};
use async_trait::async_trait;
use lumina_core::domain::QuizQuestion;
use lumina_core::ports::{PortError, PortResult, PracticeGenerationService};
use lumina_core::practice::{validate_quiz, MIN_OPTIONS, QUIZ_LENGTH};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::openai_http::OpenAiHttp;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `PracticeGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiPracticeAdapter {
    client: Client<OpenAIConfig>,
    http: OpenAiHttp,
    model: String,
}

/// The JSON envelope the quiz schema describes.
#[derive(Deserialize)]
struct QuizPayload {
    questions: Vec<QuizQuestion>,
}

/// The parts of a Responses API reply that carry generated text.
#[derive(Deserialize)]
struct ResponseBody {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ResponseBody {
    fn output_text(&self) -> String {
        self.output
            .iter()
            .flat_map(|item| &item.content)
            .filter(|c| c.kind == "output_text")
            .map(|c| c.text.as_str())
            .collect()
    }
}

/// The only shape the model may answer a quiz request with.
fn quiz_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "question": { "type": "string" },
                        "options": {
                            "type": "array",
                            "items": { "type": "string" },
                            "minItems": MIN_OPTIONS
                        },
                        "correctAnswer": { "type": "string" },
                        "explanation": { "type": "string" }
                    },
                    "required": ["question", "options", "correctAnswer", "explanation"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["questions"],
        "additionalProperties": false
    })
}

impl OpenAiPracticeAdapter {
    pub fn new(client: Client<OpenAIConfig>, http: OpenAiHttp, model: String) -> Self {
        Self { client, http, model }
    }

    fn quiz_request(&self, input: String) -> Value {
        json!({
            "model": self.model,
            "instructions": QUIZ_INSTRUCTIONS,
            "input": input,
            "max_output_tokens": 4000,
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": "practice_quiz",
                    "schema": quiz_schema(),
                    "strict": true
                }
            }
        })
    }

    async fn complete(&self, instructions: &str, input: String, max_tokens: u32) -> PortResult<String> {
        let request = CreateResponseArgs::default()
            .model(&self.model)
            .instructions(instructions)
            .input(input)
            .max_output_tokens(max_tokens)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .responses()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Network(e.to_string()))?;

        response
            .output_text()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| PortError::Unexpected("the model returned no text".to_string()))
    }

    /// Reads the schema-constrained quiz JSON and checks it can be played.
    fn parse_quiz(raw: &str) -> PortResult<Vec<QuizQuestion>> {
        let payload: QuizPayload = serde_json::from_str(raw.trim()).map_err(|e| {
            warn!("Quiz JSON did not match the expected shape: {}", e);
            PortError::Unexpected(format!("malformed quiz: {}", e))
        })?;
        validate_quiz(&payload.questions)?;
        Ok(payload.questions)
    }
}

//=========================================================================================
// `PracticeGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl PracticeGenerationService for OpenAiPracticeAdapter {
    async fn generate_quiz(&self, topic: &str, year_group: &str) -> PortResult<Vec<QuizQuestion>> {
        let input = format!(
            "Create a quiz with {} multiple-choice questions about \"{}\" suitable for a student in {}. \
             The tone should be encouraging.",
            QUIZ_LENGTH, topic, year_group
        );
        let reply: ResponseBody = self.http.post_json("responses", &self.quiz_request(input)).await?;
        let questions = Self::parse_quiz(&reply.output_text())?;
        info!("Generated a {}-question quiz on '{}'.", questions.len(), topic);
        Ok(questions)
    }

    async fn generate_worksheet(&self, topic: &str, year_group: &str) -> PortResult<String> {
        let input = format!(
            "Create a printable revision worksheet about \"{}\" for a student in {}.",
            topic, year_group
        );
        let worksheet = self.complete(WORKSHEET_INSTRUCTIONS, input, 3000).await?;
        info!("Generated a worksheet on '{}'.", topic);
        Ok(worksheet)
    }
}
