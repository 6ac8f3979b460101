//! LaTeX source generation.
//!
//! Two sources are supported, selected from configuration: a chat-completion
//! API ([`CompletionClient`]) and a canned on-disk template for cost-free
//! development. Whatever text the source returns is taken verbatim as LaTeX -
//! no well-formedness check happens here or anywhere downstream.

use crate::api::models::plans::LessonPlanRequest;
use crate::config::{GeneratorConfig, OpenAiSettings};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt::Write as _;
use std::path::PathBuf;
use thiserror::Error as ThisError;

/// System instruction sent with every completion request.
pub const SYSTEM_INSTRUCTION: &str = "You are an assistant skilled in creating LaTeX lesson plans for tutors \
teaching young children in English in Hong Kong. Generate a complete lesson plan in LaTeX format based on the \
provided details. Create the lesson plan in a beautiful table format and add didactic hints to it. Also only \
output the LaTeX code an nothing else, before or after the code.";

#[derive(ThisError, Debug)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("completion response contained no choices")]
    EmptyResponse,

    #[error("failed to read lesson plan template {path:?}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Build the user message from the lesson plan fields.
///
/// The title sentence is always present; each optional field contributes its
/// sentence only when non-empty, in the fixed order objectives, materials,
/// details.
pub fn build_user_message(plan: &LessonPlanRequest) -> String {
    let mut message = format!("Create a lesson plan titled '{}'.", plan.title);
    if let Some(objectives) = non_empty(&plan.objectives) {
        let _ = write!(message, " The objectives are: '{objectives}'.");
    }
    if let Some(materials) = non_empty(&plan.materials_needed) {
        let _ = write!(message, " Materials needed: '{materials}'.");
    }
    if let Some(details) = non_empty(&plan.plan_details) {
        let _ = write!(message, " Plan details: '{details}'.");
    }
    message
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Client for a single chat-completion call against an OpenAI-style API.
pub struct CompletionClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl CompletionClient {
    /// The request timeout bounds the whole completion call; an unresponsive
    /// API surfaces as a transport error instead of hanging the handler.
    pub fn new(settings: &OpenAiSettings) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    /// Submit one completion request and return the first choice's text.
    pub async fn complete(&self, user_message: &str) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_INSTRUCTION },
                { "role": "user", "content": user_message },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "n": 1,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or(body);
            return Err(CompletionError::Api { status, message });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }
}

/// Source of generated LaTeX, selected from configuration.
pub enum LatexGenerator {
    Completion(CompletionClient),
    Template { path: PathBuf },
}

impl LatexGenerator {
    pub fn from_config(config: &GeneratorConfig) -> anyhow::Result<Self> {
        match config {
            GeneratorConfig::Openai(settings) => Ok(LatexGenerator::Completion(CompletionClient::new(settings)?)),
            GeneratorConfig::Template { path } => Ok(LatexGenerator::Template { path: path.clone() }),
        }
    }

    /// Produce LaTeX source for the given lesson plan.
    pub async fn generate(&self, plan: &LessonPlanRequest) -> Result<String, CompletionError> {
        match self {
            LatexGenerator::Completion(client) => client.complete(&build_user_message(plan)).await,
            LatexGenerator::Template { path } => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| CompletionError::Template {
                        path: path.clone(),
                        source,
                    })
            }
        }
    }
}
