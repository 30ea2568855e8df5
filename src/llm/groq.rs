//! Groq chat-completions client (OpenAI-compatible wire format)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::error::SchemeError;
use crate::llm::LanguageModel;

const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

pub struct GroqClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl GroqClient {
    pub fn new(api_key: String, model: String, temperature: f32) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: GROQ_ENDPOINT.to_string(),
            model,
            temperature,
        })
    }

    /// Point at another OpenAI-compatible server
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl LanguageModel for GroqClient {
    fn name(&self) -> &str {
        "groq"
    }

    async fn invoke(&self, prompt: &str) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(SchemeError::Config("GROQ_API_KEY not configured".to_string()));
        }

        debug!(model = %self.model, prompt_chars = prompt.len(), "Calling Groq API");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(|e| {
                error!("Groq API request failed: {}", e);
                SchemeError::Llm(format!("Groq API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Groq API error response: {} {}", status, error_text);
            return Err(SchemeError::Llm(format!(
                "Groq API returned {}: {}",
                status, error_text
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| SchemeError::Llm(format!("Groq parse error: {}", e)))?;

        first_choice(body)
    }
}

fn first_choice(body: ChatResponse) -> crate::Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| SchemeError::Llm("Empty response from Groq".to_string()))
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
