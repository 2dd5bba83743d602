/*!
 * Batch entry points.
 *
 * `Batcher` binds a dispatcher configuration to a chat backend and an optional
 * embedding backend. Every run returns one slot per input, in input order,
 * and the positions that ended up empty are both reported with the run and
 * accumulated on the instance until `reset_miss_index` is called.
 */

use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

use crate::app_config::Config;
use crate::batch::{ChunkedDispatcher, DispatchSettings, Invoker, MissIndex, reassemble, tag};
use crate::errors::{BatchError, ProviderError};
use crate::providers::{self, ChatBackend, EmbeddingBackend};

/// Called with `(completed_chunks, total_chunks)` after every chunk
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Values of one run plus the positions that have no value
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport<V> {
    /// One slot per input, in input order
    pub values: Vec<Option<V>>,
    /// Sorted positions whose slot is `None`
    pub missed: Vec<usize>,
}

impl<V> BatchReport<V> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of inputs that produced a value
    pub fn succeeded(&self) -> usize {
        self.values.len() - self.missed.len()
    }
}

struct TextInvoker {
    backend: Arc<dyn ChatBackend>,
    system_prompt: Arc<str>,
}

#[async_trait]
impl Invoker for TextInvoker {
    type Input = String;
    type Output = String;

    async fn invoke(&self, input: String) -> Result<String, ProviderError> {
        self.backend.generate(&self.system_prompt, &input).await
    }
}

struct EmbeddingInvoker {
    backend: Arc<dyn EmbeddingBackend>,
}

#[async_trait]
impl Invoker for EmbeddingInvoker {
    type Input = String;
    type Output = Vec<f32>;

    async fn invoke(&self, input: String) -> Result<Vec<f32>, ProviderError> {
        self.backend.embed(&input).await
    }
}

/// Runs text and embedding batches against configured backends
pub struct Batcher {
    settings: DispatchSettings,
    system_prompt: Arc<str>,
    chat: Arc<dyn ChatBackend>,
    embedding: Option<Arc<dyn EmbeddingBackend>>,
    misses: MissIndex,
    progress: Option<ProgressCallback>,
}

impl Batcher {
    /// Build a batcher and its backends from a validated configuration
    pub fn new(config: &Config) -> Result<Self, BatchError> {
        config.validate()?;
        let backends = providers::connect(config)?;

        info!(
            "Using {} backend with model {} ({} workers, {:.1}s wave timeout, {} waves)",
            backends.chat.name(),
            config.model,
            config.num_workers,
            config.timeout_secs,
            config.retry_attempts
        );

        Ok(Self::with_backends(
            config.dispatch_settings()?,
            config.system_prompt.as_str(),
            backends.chat,
            backends.embedding,
        ))
    }

    /// Build a batcher around existing backends
    pub fn with_backends(
        settings: DispatchSettings,
        system_prompt: impl Into<String>,
        chat: Arc<dyn ChatBackend>,
        embedding: Option<Arc<dyn EmbeddingBackend>>,
    ) -> Self {
        Self {
            settings,
            system_prompt: Arc::from(system_prompt.into()),
            chat,
            embedding,
            misses: MissIndex::new(),
            progress: None,
        }
    }

    /// Report chunk progress to `callback` during every run
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn supports_embeddings(&self) -> bool {
        self.embedding.is_some()
    }

    /// Generate a reply for every input; `None` marks a failed position
    pub async fn handle_text_batch<I, S>(
        &self,
        inputs: I,
    ) -> Result<Vec<Option<String>>, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.run_text_batch(inputs).await?.values)
    }

    /// Embed every input; `None` marks a failed position
    pub async fn handle_embedding_batch<I, S>(
        &self,
        inputs: I,
    ) -> Result<Vec<Option<Vec<f32>>>, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.run_embedding_batch(inputs).await?.values)
    }

    /// Like `handle_text_batch`, also returning this run's missed positions
    pub async fn run_text_batch<I, S>(&self, inputs: I) -> Result<BatchReport<String>, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invoker = TextInvoker {
            backend: Arc::clone(&self.chat),
            system_prompt: Arc::clone(&self.system_prompt),
        };
        self.run(invoker, inputs.into_iter().map(Into::into).collect()).await
    }

    /// Like `handle_embedding_batch`, also returning this run's missed positions
    pub async fn run_embedding_batch<I, S>(
        &self,
        inputs: I,
    ) -> Result<BatchReport<Vec<f32>>, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = self
            .embedding
            .clone()
            .ok_or_else(|| BatchError::EmbeddingsUnsupported {
                backend: self.chat.name().to_string(),
            })?;
        self.run(
            EmbeddingInvoker { backend },
            inputs.into_iter().map(Into::into).collect(),
        )
        .await
    }

    /// Positions missed since creation or the last reset, sorted
    pub fn get_miss_index(&self) -> Vec<usize> {
        self.misses.to_vec()
    }

    pub fn reset_miss_index(&self) {
        self.misses.clear();
    }

    async fn run<V>(
        &self,
        invoker: V,
        inputs: Vec<String>,
    ) -> Result<BatchReport<V::Output>, BatchError>
    where
        V: Invoker<Input = String>,
    {
        let expected_length = inputs.len();
        let run_misses = MissIndex::new();
        let dispatcher = ChunkedDispatcher::new(Arc::new(invoker), self.settings)?;

        let results = match &self.progress {
            Some(callback) => {
                dispatcher
                    .run_with_progress(tag(inputs), &run_misses, callback.as_ref())
                    .await?
            }
            None => dispatcher.run(tag(inputs), &run_misses).await?,
        };

        let values = reassemble(results, expected_length, &run_misses);
        let missed = run_misses.to_vec();
        self.misses.extend(missed.iter().copied());

        debug!(
            "Batch of {} finished with {} missed positions",
            expected_length,
            missed.len()
        );

        Ok(BatchReport { values, missed })
    }
}
