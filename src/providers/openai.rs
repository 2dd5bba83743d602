use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;

use super::{ChatBackend, EmbeddingBackend};

/// Public OpenAI API base URL
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// OpenAI client for chat completions and embeddings.
///
/// Works against any OpenAI-compatible service when given an endpoint.
#[derive(Debug, Clone)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API base URL, e.g. `https://api.openai.com/v1`
    endpoint: String,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<OpenAIMessage>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

/// Message as returned inside a choice; content can be null
#[derive(Debug, Deserialize)]
pub struct OpenAIChoiceMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// One completion choice
#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIChoiceMessage,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct OpenAIUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    pub choices: Vec<OpenAIChoice>,
    #[serde(default)]
    pub usage: Option<OpenAIUsage>,
}

/// Embedding request
#[derive(Debug, Serialize)]
pub struct EmbeddingRequest {
    model: String,
    input: String,
}

/// One embedding vector
#[derive(Debug, Deserialize)]
pub struct EmbeddingData {
    #[serde(default)]
    pub index: usize,
    pub embedding: Vec<f32>,
}

/// Embedding response
#[derive(Debug, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

impl OpenAIRequest {
    /// Create a new chat completion request
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(OpenAIMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl EmbeddingRequest {
    pub fn new(model: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
        }
    }
}

impl OpenAI {
    /// Create a new client; an empty endpoint selects the public API
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let endpoint = endpoint.into();
        let endpoint = if endpoint.trim().is_empty() {
            DEFAULT_ENDPOINT.to_string()
        } else {
            endpoint.trim_end_matches('/').to_string()
        };

        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint,
        })
    }

    /// Base URL requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Complete a chat request
    pub async fn complete(&self, request: OpenAIRequest) -> Result<OpenAIResponse, ProviderError> {
        self.post_json("chat/completions", &request).await
    }

    /// Compute embeddings
    pub async fn embeddings(
        &self,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, ProviderError> {
        self.post_json("embeddings", &request).await
    }

    /// Extract the text of the first choice
    pub fn extract_text(response: &OpenAIResponse) -> Option<String> {
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, ProviderError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.endpoint, path);

        let mut request = self.client.post(&url).json(body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("OpenAI API error ({}): {}", status, error_text);
            return Err(ProviderError::from_status(status, error_text));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

/// OpenAI client bound to a model and sampling temperature
#[derive(Debug)]
pub struct OpenAIBackend {
    client: OpenAI,
    model: String,
    temperature: f32,
}

impl OpenAIBackend {
    pub fn new(client: OpenAI, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    fn chat_request(&self, system_prompt: &str, text: &str) -> OpenAIRequest {
        let mut request = OpenAIRequest::new(&self.model).temperature(self.temperature);
        if !system_prompt.is_empty() {
            request = request.add_message("system", system_prompt);
        }
        request.add_message("user", text)
    }
}

#[async_trait]
impl ChatBackend for OpenAIBackend {
    async fn generate(&self, system_prompt: &str, text: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .complete(self.chat_request(system_prompt, text))
            .await?;

        if let Some(usage) = &response.usage {
            debug!(
                "OpenAI usage: {} prompt / {} completion tokens",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        OpenAI::extract_text(&response)
            .ok_or_else(|| ProviderError::EmptyResponse(format!("OpenAI model {}", self.model)))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let response = self
            .client
            .embeddings(EmbeddingRequest::new(&self.model, text))
            .await?;

        response
            .data
            .into_iter()
            .min_by_key(|data| data.index)
            .map(|data| data.embedding)
            .ok_or_else(|| ProviderError::EmptyResponse(format!("OpenAI model {}", self.model)))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
