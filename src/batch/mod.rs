/*!
 * Order-preserving batch execution.
 *
 * This module contains the machinery that fans a list of inputs out to a
 * bounded worker pool and puts the answers back in input order:
 * - `indexer`: position tagging, chunking and gap-filling reassembly
 * - `miss_index`: the shared set of positions that produced no value
 * - `dispatcher`: chunked, wave-based execution with timeout and retry
 */

pub mod dispatcher;
pub mod indexer;
pub mod miss_index;

pub use dispatcher::{ChunkedDispatcher, DispatchSettings, Invoker};
pub use indexer::{IndexedItem, IndexedResult, chunk_items, reassemble, tag};
pub use miss_index::MissIndex;
