/*!
 * Chunked, wave-based dispatch against a bounded worker pool.
 *
 * Items are split into chunks of `worker_count`. Chunks run one after the
 * other; inside a chunk every outstanding item is submitted at once (a wave),
 * the dispatcher waits at most `wave_timeout` for the wave, abandons what is
 * still running and resubmits only those stragglers, up to `retry_waves`
 * waves per chunk.
 */

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::errors::{BatchError, ProviderError};

use super::indexer::{IndexedItem, IndexedResult, chunk_items};
use super::miss_index::MissIndex;

/// One unit of inference work for one input.
///
/// Implementations are shared by every worker of a run, so they must be safe
/// to call concurrently and must not mutate shared configuration. A returned
/// error is treated as a permanent failure for that input.
#[async_trait]
pub trait Invoker: Send + Sync + 'static {
    /// Payload handed to each call
    type Input: Clone + Send + Sync + 'static;

    /// Value produced by a successful call
    type Output: Send + 'static;

    /// Perform the call for a single input
    async fn invoke(&self, input: Self::Input) -> Result<Self::Output, ProviderError>;
}

/// Pool size, per-wave wait and retry ceiling for a dispatcher
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchSettings {
    /// Worker pool size; also the chunk size
    pub worker_count: usize,
    /// How long to wait for one wave before abandoning its stragglers
    pub wave_timeout: Duration,
    /// Maximum number of waves per chunk, the first one included
    pub retry_waves: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            worker_count: 64,
            wave_timeout: Duration::from_secs(60),
            retry_waves: 2,
        }
    }
}

impl DispatchSettings {
    /// Create validated settings
    pub fn new(
        worker_count: usize,
        wave_timeout: Duration,
        retry_waves: usize,
    ) -> Result<Self, BatchError> {
        let settings = Self {
            worker_count,
            wave_timeout,
            retry_waves,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.worker_count == 0 {
            return Err(BatchError::InvalidSettings(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.worker_count > Semaphore::MAX_PERMITS {
            return Err(BatchError::InvalidSettings(format!(
                "worker_count must be at most {}, got {}",
                Semaphore::MAX_PERMITS,
                self.worker_count
            )));
        }
        if self.retry_waves == 0 {
            return Err(BatchError::InvalidSettings(
                "retry_waves must be at least 1".to_string(),
            ));
        }
        if self.wave_timeout.is_zero() {
            return Err(BatchError::InvalidSettings(
                "wave_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Upper bound on the time spent waiting for `item_count` items
    pub fn worst_case_duration(&self, item_count: usize) -> Duration {
        let chunks = item_count.div_ceil(self.worker_count.max(1));
        let waves = u32::try_from(chunks.saturating_mul(self.retry_waves)).unwrap_or(u32::MAX);
        self.wave_timeout.saturating_mul(waves)
    }
}

/// Why a worker task ended without a value
enum TaskFailure {
    PoolClosed,
    Invoke(ProviderError),
}

/// What one wave produced
struct WaveOutcome<I, O> {
    completed: Vec<IndexedResult<O>>,
    abandoned: Vec<IndexedItem<I>>,
}

/// Runs an invoker over indexed items with bounded parallelism and retries
pub struct ChunkedDispatcher<V: Invoker> {
    invoker: Arc<V>,
    settings: DispatchSettings,
}

impl<V: Invoker> ChunkedDispatcher<V> {
    /// Create a dispatcher; fails if the settings are out of range
    pub fn new(invoker: Arc<V>, settings: DispatchSettings) -> Result<Self, BatchError> {
        settings.validate()?;
        Ok(Self { invoker, settings })
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Run every item and return the results that completed, in no particular order
    pub async fn run(
        &self,
        items: Vec<IndexedItem<V::Input>>,
        misses: &MissIndex,
    ) -> Result<Vec<IndexedResult<V::Output>>, BatchError> {
        self.run_with_progress(items, misses, &|_, _| {}).await
    }

    /// Same as `run`, calling `progress(done_chunks, total_chunks)` after each chunk
    pub async fn run_with_progress(
        &self,
        items: Vec<IndexedItem<V::Input>>,
        misses: &MissIndex,
        progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> Result<Vec<IndexedResult<V::Output>>, BatchError> {
        if items.is_empty() {
            debug!("Nothing to dispatch");
            return Ok(Vec::new());
        }

        let total_items = items.len();
        let chunks = chunk_items(items, self.settings.worker_count);
        let total_chunks = chunks.len();
        let pool = Arc::new(Semaphore::new(self.settings.worker_count));

        let mut collected = Vec::with_capacity(total_items);
        let mut outcome = Ok(());

        for (chunk_number, chunk) in chunks.into_iter().enumerate() {
            debug!(
                "Processing chunk {} of {} ({} items)",
                chunk_number + 1,
                total_chunks,
                chunk.len()
            );

            if let Err(e) = self.run_chunk(chunk, &pool, misses, &mut collected).await {
                error!("Aborting batch in chunk {}: {}", chunk_number + 1, e);
                outcome = Err(e);
                break;
            }

            progress(chunk_number + 1, total_chunks);
        }

        // Abandoned tasks still waiting for a permit fail fast from here on
        pool.close();
        outcome?;

        info!(
            "Dispatched {} items in {} chunks, {} results collected",
            total_items,
            total_chunks,
            collected.len()
        );

        Ok(collected)
    }

    async fn run_chunk(
        &self,
        chunk: Vec<IndexedItem<V::Input>>,
        pool: &Arc<Semaphore>,
        misses: &MissIndex,
        collected: &mut Vec<IndexedResult<V::Output>>,
    ) -> Result<(), BatchError> {
        let mut wave = chunk;

        for attempt in 1..=self.settings.retry_waves {
            let WaveOutcome {
                completed,
                abandoned,
            } = self.run_wave(wave, pool, misses).await?;
            collected.extend(completed);

            if abandoned.is_empty() {
                return Ok(());
            }

            if attempt == self.settings.retry_waves {
                warn!(
                    "Giving up on {} items after {} waves: {:?}",
                    abandoned.len(),
                    attempt,
                    abandoned.iter().map(|item| item.index).collect::<Vec<_>>()
                );
                return Ok(());
            }

            debug!(
                "Wave {} timed out with {} items pending, retrying",
                attempt,
                abandoned.len()
            );
            wave = abandoned;
        }

        Ok(())
    }

    async fn run_wave(
        &self,
        wave: Vec<IndexedItem<V::Input>>,
        pool: &Arc<Semaphore>,
        misses: &MissIndex,
    ) -> Result<WaveOutcome<V::Input, V::Output>, BatchError> {
        let deadline = wave_deadline(Instant::now(), self.settings.wave_timeout);
        let mut pending: HashMap<usize, (IndexedItem<V::Input>, AbortHandle)> =
            HashMap::with_capacity(wave.len());
        let mut in_flight = FuturesUnordered::new();

        for item in wave {
            let index = item.index;
            let input = item.payload.clone();
            let invoker = Arc::clone(&self.invoker);
            let pool = Arc::clone(pool);

            let handle = tokio::spawn(async move {
                let _permit = pool
                    .acquire_owned()
                    .await
                    .map_err(|_| TaskFailure::PoolClosed)?;
                invoker.invoke(input).await.map_err(TaskFailure::Invoke)
            });

            pending.insert(index, (item, handle.abort_handle()));
            in_flight.push(async move { (index, handle.await) });
        }

        let mut completed = Vec::with_capacity(pending.len());

        while let Ok(Some((index, joined))) =
            tokio::time::timeout_at(deadline, in_flight.next()).await
        {
            pending.remove(&index);

            match joined {
                Ok(Ok(value)) => completed.push(IndexedResult::success(index, value)),
                Ok(Err(TaskFailure::Invoke(e))) => {
                    warn!("Item {} failed: {}", index, e);
                    misses.record(index);
                    completed.push(IndexedResult::missing(index));
                }
                // Only reachable if the pool or the runtime is torn down mid-run
                Ok(Err(TaskFailure::PoolClosed)) => {
                    abandon(pending);
                    return Err(BatchError::PoolClosed);
                }
                Err(join_error) if join_error.is_panic() => {
                    error!("Worker for item {} panicked", index);
                    misses.record(index);
                    completed.push(IndexedResult::missing(index));
                }
                Err(join_error) => {
                    abandon(pending);
                    return Err(BatchError::WorkerCancelled(join_error.to_string()));
                }
            }
        }

        Ok(WaveOutcome {
            completed,
            abandoned: abandon(pending),
        })
    }
}

/// `start + timeout`, with the timeout capped at thirty years so the addition cannot overflow
fn wave_deadline(start: Instant, timeout: Duration) -> Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);
    start + timeout.min(FAR_FUTURE)
}

/// Request cancellation of every pending task and hand back their items in index order.
///
/// Cancellation is best effort: a task blocked outside an await point keeps
/// running, but its join handle is already gone so its result is never read.
fn abandon<I>(pending: HashMap<usize, (IndexedItem<I>, AbortHandle)>) -> Vec<IndexedItem<I>> {
    let mut items: Vec<IndexedItem<I>> = pending
        .into_values()
        .map(|(item, abort_handle)| {
            abort_handle.abort();
            item
        })
        .collect();
    items.sort_by_key(|item| item.index);
    items
}
