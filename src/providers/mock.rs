/*!
 * Mock backend for testing.
 *
 * This module provides a backend that simulates different behaviors:
 * - `MockProvider::working()` - Always succeeds, echoing the input
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::hanging()` - Never answers (for timeout testing)
 * - `MockProvider::fail_on(..)` / `hang_on(..)` - Misbehaves for chosen inputs only
 * - `MockProvider::slow_first_attempt(..)` - Slow on the first call per input, fast afterwards
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;

use super::{ChatBackend, EmbeddingBackend};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Simulates slow response
    Slow { delay_ms: u64 },
    /// Never responds
    Hanging,
    /// Fails for the listed inputs, succeeds otherwise
    FailOn(HashSet<String>),
    /// Never responds for the listed inputs, succeeds otherwise
    HangOn(HashSet<String>),
    /// First call per input takes `delay_ms`, later calls answer at once
    SlowFirstAttempt { delay_ms: u64 },
}

/// Mock provider for testing batch behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
    /// Inputs seen so far, for `SlowFirstAttempt`
    seen: Arc<Mutex<HashSet<String>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent {
            fail_every: fail_every.max(1),
        })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that answers after `delay_ms`
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Create a mock that never answers
    pub fn hanging() -> Self {
        Self::new(MockBehavior::Hanging)
    }

    /// Create a mock that fails for the given inputs
    pub fn fail_on(inputs: &[&str]) -> Self {
        Self::new(MockBehavior::FailOn(to_set(inputs)))
    }

    /// Create a mock that never answers for the given inputs
    pub fn hang_on(inputs: &[&str]) -> Self {
        Self::new(MockBehavior::HangOn(to_set(inputs)))
    }

    /// Create a mock that is slow the first time it sees an input
    pub fn slow_first_attempt(delay_ms: u64) -> Self {
        Self::new(MockBehavior::SlowFirstAttempt { delay_ms })
    }

    /// Number of calls received so far, including abandoned ones
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// The text a working mock answers with
    pub fn echo(text: &str) -> String {
        format!("ECHO:{}", text)
    }

    /// The vector a working mock embeds `text` into
    pub fn fake_embedding(text: &str) -> Vec<f32> {
        let byte_sum: u32 = text.bytes().map(u32::from).sum();
        vec![text.chars().count() as f32, byte_sum as f32]
    }

    async fn simulate(&self, text: &str) -> Result<(), ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            MockBehavior::Working => Ok(()),
            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        status_code: 500,
                        message: format!("Simulated failure on request {}", count + 1),
                    })
                } else {
                    Ok(())
                }
            }
            MockBehavior::Failing => Err(ProviderError::ConnectionError(
                "Simulated connection failure".to_string(),
            )),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(())
            }
            MockBehavior::Hanging => std::future::pending().await,
            MockBehavior::FailOn(inputs) => {
                if inputs.contains(text) {
                    Err(ProviderError::RequestFailed(format!(
                        "Simulated failure for '{}'",
                        text
                    )))
                } else {
                    Ok(())
                }
            }
            MockBehavior::HangOn(inputs) => {
                if inputs.contains(text) {
                    std::future::pending::<()>().await;
                }
                Ok(())
            }
            MockBehavior::SlowFirstAttempt { delay_ms } => {
                let first_time = self.seen.lock().insert(text.to_string());
                if first_time {
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                }
                Ok(())
            }
        }
    }
}

fn to_set(inputs: &[&str]) -> HashSet<String> {
    inputs.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl ChatBackend for MockProvider {
    async fn generate(&self, _system_prompt: &str, text: &str) -> Result<String, ProviderError> {
        self.simulate(text).await?;
        Ok(Self::echo(text))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[async_trait]
impl EmbeddingBackend for MockProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.simulate(text).await?;
        Ok(Self::fake_embedding(text))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
