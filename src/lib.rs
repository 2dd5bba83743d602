/*!
 * # gpt-batch - Concurrent batch inference for LLM APIs
 *
 * A Rust library that sends many independent prompts (or embedding inputs)
 * to a model provider with bounded concurrency, and hands back one result
 * slot per input in input order.
 *
 * ## Features
 *
 * - Bounded worker pool, processed chunk by chunk
 * - Timeout-bounded waves; only the stragglers of a wave are retried
 * - Permanent failures become `None` holes and are tracked in a miss index
 * - Backends:
 *   - OpenAI API (and OpenAI-compatible servers): chat and embeddings
 *   - Anthropic API: chat
 *   - In-process mock for tests and benchmarks
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `batch`: indexing, chunked wave dispatch and reassembly:
 *   - `batch::indexer`: position tagging, chunking, reassembly
 *   - `batch::dispatcher`: the wave loop over a worker pool
 *   - `batch::miss_index`: shared set of failed positions
 * - `batcher`: text and embedding entry points over the configured backends
 * - `providers`: client implementations for the supported services
 * - `app_config`: configuration management
 * - `errors`: error types for the library
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod batch;
pub mod batcher;
pub mod errors;
pub mod providers;

// Re-export main types for easier usage
pub use app_config::{Backend, Config};
pub use batch::{DispatchSettings, MissIndex};
pub use batcher::{BatchReport, Batcher, ProgressCallback};
pub use errors::{BatchError, ProviderError};
