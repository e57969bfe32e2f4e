//! Text generation contract
//!
//! A single instruction + context prompt in, an HTML fragment out.

use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Everything the model sees for one section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationPrompt {
    /// Section-specific instruction (the template's `ia_prompt`)
    pub instruction: String,
    /// What the user asked for
    pub question: String,
    /// Retrieved passages, most relevant first
    pub context: Vec<String>,
}

impl GenerationPrompt {
    /// Flatten into the single user message sent to the model
    pub fn render(&self) -> String {
        let context = if self.context.is_empty() {
            "No context available.".to_string()
        } else {
            self.context.join("\n\n")
        };

        format!(
            "{}\n\n\
            You are an expert assistant writing ONE ANSWER IN STRICTLY VALID HTML, \
            to be embedded directly in a document (no free text outside tags).\n\n\
            <CONTEXT_START>\n{}\n<CONTEXT_END>\n\n\
            <USER_REQUEST>\n{}\n<END_USER_REQUEST>\n\n\
            Formatting rules (HTML only):\n\
            - Use only <h4> to <h6> for headings.\n\
            - Wrap each paragraph in <p>.\n\
            - Use <ul> or <ol> with <li> for lists.\n\
            - Build tabular data as a <table> with <thead>, <tbody>, <tr>, <th> and <td>.\n\n\
            Content rules:\n\
            1. Keep only the parts of the context relevant to the request.\n\
            2. Rephrase or summarize for clarity when needed.\n\
            3. Wrap any quotation from the context in <blockquote> or <em>.\n\n\
            Answer (HTML only):\n",
            self.instruction, context, self.question
        )
    }
}

/// Trait for section content generation
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat-completions client (OpenRouter, OpenAI, vLLM...)
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "generation.api_key is required for the chat provider".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.render(),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::GenerationError {
                message: format!("LLM API request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GenerationError {
                message: format!("LLM API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| AppError::GenerationError {
                message: format!("Failed to parse LLM response: {}", e),
            })?;

        chat_response
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AppError::GenerationError {
                message: "Empty response from LLM".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Offline generator: wraps the question and context in HTML verbatim
pub struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String> {
        let mut html = format!("<p>{}</p>", escape_html(&prompt.question));
        if !prompt.context.is_empty() {
            html.push_str("<ul>");
            for passage in &prompt.context {
                html.push_str(&format!("<li><em>{}</em></li>", escape_html(passage)));
            }
            html.push_str("</ul>");
        }
        Ok(html)
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Create a generator based on configuration
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "openrouter" | "openai" | "chat" => Ok(Arc::new(ChatCompletionsGenerator::new(config)?)),
        "echo" => Ok(Arc::new(EchoGenerator)),
        other => {
            tracing::warn!(provider = other, "Unknown generation provider, using echo generator");
            Ok(Arc::new(EchoGenerator))
        }
    }
}
