/*!
 * Backends that perform the actual inference calls.
 *
 * This module contains client implementations for the supported services:
 * - OpenAI: chat completions and embeddings, any OpenAI-compatible endpoint
 * - Anthropic: messages API (chat only)
 * - Mock: deterministic in-process backend for tests and benchmarks
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{Backend, Config};
use crate::errors::{BatchError, ProviderError};

pub mod anthropic;
pub mod mock;
pub mod openai;

/// Chat/completion capability
///
/// Implementations are shared across all workers of a batch, so a single
/// client handle must be safe to call concurrently.
#[async_trait]
pub trait ChatBackend: Send + Sync + Debug {
    /// Generate a reply to `text`, guided by `system_prompt`
    ///
    /// # Arguments
    /// * `system_prompt` - Instructions applied to every item of the batch
    /// * `text` - The item text
    async fn generate(&self, system_prompt: &str, text: &str) -> Result<String, ProviderError>;

    /// Short backend name used in logs and errors
    fn name(&self) -> &str;
}

/// Embedding capability
#[async_trait]
pub trait EmbeddingBackend: Send + Sync + Debug {
    /// Compute the embedding vector of `text`
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Short backend name used in logs and errors
    fn name(&self) -> &str;
}

/// Backends built from a configuration
#[derive(Debug, Clone)]
pub struct BackendSet {
    pub chat: Arc<dyn ChatBackend>,
    /// `None` when the selected service has no embedding endpoint
    pub embedding: Option<Arc<dyn EmbeddingBackend>>,
}

/// Build the backends selected by `config`
pub fn connect(config: &Config) -> Result<BackendSet, BatchError> {
    let backend = config.resolve_backend()?;
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let endpoint = config.endpoint_override().unwrap_or_default();

    match backend {
        Backend::OpenAI => {
            let client = openai::OpenAI::new(&config.api_key, endpoint, timeout)?;
            let backend = Arc::new(openai::OpenAIBackend::new(
                client,
                &config.model,
                config.temperature,
            ));
            Ok(BackendSet {
                chat: backend.clone(),
                embedding: Some(backend as Arc<dyn EmbeddingBackend>),
            })
        }
        Backend::Anthropic => {
            let client = anthropic::Anthropic::new(&config.api_key, endpoint, timeout)?;
            let backend = Arc::new(anthropic::AnthropicBackend::new(
                client,
                &config.model,
                config.temperature,
                config.max_tokens,
            ));
            Ok(BackendSet {
                chat: backend,
                embedding: None,
            })
        }
    }
}
