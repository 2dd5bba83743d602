/*!
 * Position tagging and reassembly.
 *
 * Inputs are tagged with their position before dispatch. Whatever comes back
 * from the dispatcher, in whatever order, is folded into a sequence with the
 * exact length of the input, holes marked as `None`.
 */

use log::warn;

use super::miss_index::MissIndex;

/// An input paired with its position in the original sequence
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedItem<T> {
    pub index: usize,
    pub payload: T,
}

/// The outcome for one position; `None` marks a permanent failure
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedResult<V> {
    pub index: usize,
    pub value: Option<V>,
}

impl<V> IndexedResult<V> {
    pub fn success(index: usize, value: V) -> Self {
        Self {
            index,
            value: Some(value),
        }
    }

    pub fn missing(index: usize) -> Self {
        Self { index, value: None }
    }
}

/// Tag every input with its position
pub fn tag<T>(inputs: impl IntoIterator<Item = T>) -> Vec<IndexedItem<T>> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, payload)| IndexedItem { index, payload })
        .collect()
}

/// Split items into contiguous groups of at most `size` (the last may be shorter)
pub fn chunk_items<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter();
    loop {
        let chunk: Vec<T> = iter.by_ref().take(size).collect();
        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }
    chunks
}

/// Rebuild a sequence of `expected_length` values from unordered results.
///
/// Every position without a value is recorded in `misses`. Results pointing
/// past `expected_length` are dropped. If a position shows up twice, the
/// first result after sorting wins.
pub fn reassemble<V>(
    mut results: Vec<IndexedResult<V>>,
    expected_length: usize,
    misses: &MissIndex,
) -> Vec<Option<V>> {
    results.sort_by_key(|result| result.index);

    let mut slots: Vec<Option<V>> = Vec::with_capacity(expected_length);
    slots.resize_with(expected_length, || None);
    let mut filled = vec![false; expected_length];

    for result in results {
        if result.index >= expected_length {
            warn!(
                "Ignoring result for index {} outside of {} inputs",
                result.index, expected_length
            );
            continue;
        }
        if filled[result.index] {
            continue;
        }
        filled[result.index] = true;
        slots[result.index] = result.value;
    }

    for (index, slot) in slots.iter().enumerate() {
        if slot.is_none() {
            misses.record(index);
        }
    }

    slots
}
