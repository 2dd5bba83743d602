/*!
 * Tests for the batcher entry points using the mock backend
 */

use std::sync::Arc;
use std::time::Duration;

use gpt_batch::batch::DispatchSettings;
use gpt_batch::providers::mock::MockProvider;
use gpt_batch::{BatchError, Batcher};

use crate::common;

/// Test that the echo backend answers every item in order
#[tokio::test]
async fn test_handle_text_batch_withEchoBackend_shouldMatchInputOrder() {
    common::init_logging();
    let batcher = common::mock_batcher(MockProvider::working(), common::fast_settings(4, 2));

    let results = batcher.handle_text_batch(["a", "b", "c"]).await.unwrap();

    assert_eq!(
        results,
        vec![
            Some("ECHO:a".to_string()),
            Some("ECHO:b".to_string()),
            Some("ECHO:c".to_string()),
        ]
    );
}

/// Test that the result length always matches the input length
#[tokio::test]
async fn test_handle_text_batch_withVariousSizes_shouldKeepLength() {
    let batcher = common::mock_batcher(MockProvider::intermittent(3), common::fast_settings(4, 2));

    for size in [0, 1, 4, 5, 17] {
        let results = batcher
            .handle_text_batch(common::numbered_inputs(size))
            .await
            .unwrap();
        assert_eq!(results.len(), size);
    }
}

/// Test that a permanent failure at index 1 leaves exactly one hole
#[tokio::test]
async fn test_handle_text_batch_withFailingSecondItem_shouldLeaveHoleAtOne() {
    let mock = MockProvider::fail_on(&["b"]);
    let batcher = common::mock_batcher(mock.clone(), common::fast_settings(4, 3));

    let results = batcher.handle_text_batch(["a", "b", "c"]).await.unwrap();

    assert_eq!(results[0].as_deref(), Some("ECHO:a"));
    assert_eq!(results[1], None);
    assert_eq!(results[2].as_deref(), Some("ECHO:c"));
    assert_eq!(batcher.get_miss_index(), vec![1]);
    // Explicit failures are not retried
    assert_eq!(mock.request_count(), 3);
}

/// Test that a backend that never answers still lets the batch finish
#[tokio::test]
async fn test_handle_text_batch_withHangingBackend_shouldReturnAllHoles() {
    let settings = common::fast_settings(2, 2);
    let batcher = common::mock_batcher(MockProvider::hanging(), settings);

    let results = tokio::time::timeout(
        settings.worst_case_duration(3) + Duration::from_secs(1),
        batcher.handle_text_batch(["a", "b", "c"]),
    )
    .await
    .expect("batch should terminate")
    .unwrap();

    assert_eq!(results, vec![None, None, None]);
    assert_eq!(batcher.get_miss_index(), vec![0, 1, 2]);
}

/// Test that an empty batch never calls the backend
#[test]
fn test_handle_text_batch_withEmptyInput_shouldNotCallBackend() {
    let mock = MockProvider::working();
    let batcher = common::mock_batcher(mock.clone(), common::fast_settings(4, 2));

    let results =
        tokio_test::block_on(batcher.handle_text_batch(Vec::<String>::new())).unwrap();

    assert!(results.is_empty());
    assert_eq!(mock.request_count(), 0);
}

/// Test four workers over ten inputs
#[tokio::test]
async fn test_handle_text_batch_withFourWorkersTenInputs_shouldKeepOrder() {
    let batcher = common::mock_batcher(MockProvider::slow(5), common::fast_settings(4, 2));
    let inputs = common::numbered_inputs(10);

    let results = batcher.handle_text_batch(inputs.clone()).await.unwrap();

    let expected: Vec<Option<String>> =
        inputs.iter().map(|i| Some(MockProvider::echo(i))).collect();
    assert_eq!(results, expected);
}

/// Test that an input slow only on its first attempt is recovered by the retry wave
#[tokio::test]
async fn test_run_text_batch_withSlowFirstAttempt_shouldRecoverOnRetry() {
    let mock = MockProvider::slow_first_attempt(10_000);
    let batcher = common::mock_batcher(mock.clone(), common::fast_settings(4, 2));

    let report = batcher.run_text_batch(["x", "y"]).await.unwrap();

    assert!(report.missed.is_empty());
    assert_eq!(report.values[1].as_deref(), Some("ECHO:y"));
    assert_eq!(mock.request_count(), 4);
}

/// Test that a single wave leaves the slow inputs as holes
#[tokio::test]
async fn test_run_text_batch_withSingleWave_shouldNotRetry() {
    let mock = MockProvider::slow_first_attempt(10_000);
    let batcher = common::mock_batcher(mock.clone(), common::fast_settings(4, 1));

    let report = batcher.run_text_batch(["x", "y"]).await.unwrap();

    assert_eq!(report.missed, vec![0, 1]);
    assert_eq!(report.succeeded(), 0);
    assert_eq!(mock.request_count(), 2);
}

/// Test that only the hanging input is missed among working ones
#[tokio::test]
async fn test_run_text_batch_withOneHangingInput_shouldMissOnlyThatOne() {
    let batcher =
        common::mock_batcher(MockProvider::hang_on(&["item-5"]), common::fast_settings(4, 2));

    let report = batcher.run_text_batch(common::numbered_inputs(8)).await.unwrap();

    assert_eq!(report.missed, vec![5]);
    assert_eq!(report.succeeded(), 7);
}

/// Test that per-run misses and accumulated misses are kept apart
#[tokio::test]
async fn test_miss_index_withSeveralRuns_shouldAccumulateUntilReset() {
    let batcher =
        common::mock_batcher(MockProvider::fail_on(&["bad"]), common::fast_settings(4, 2));

    let first = batcher.run_text_batch(["bad", "ok"]).await.unwrap();
    let second = batcher.run_text_batch(["ok", "ok", "bad"]).await.unwrap();

    assert_eq!(first.missed, vec![0]);
    assert_eq!(second.missed, vec![2]);
    assert_eq!(batcher.get_miss_index(), vec![0, 2]);

    batcher.reset_miss_index();
    assert!(batcher.get_miss_index().is_empty());
}

/// Test embeddings through the mock backend
#[tokio::test]
async fn test_handle_embedding_batch_withMockBackend_shouldReturnVectorsInOrder() {
    let batcher =
        common::mock_batcher(MockProvider::fail_on(&["skip"]), common::fast_settings(2, 2));

    let results = batcher.handle_embedding_batch(["abc", "skip", "z"]).await.unwrap();

    assert_eq!(results[0], Some(MockProvider::fake_embedding("abc")));
    assert_eq!(results[1], None);
    assert_eq!(results[2], Some(MockProvider::fake_embedding("z")));
}

/// Test that a chat-only batcher refuses embedding batches
#[tokio::test]
async fn test_handle_embedding_batch_withChatOnlyBackend_shouldFail() {
    let mock = MockProvider::working();
    let batcher = Batcher::with_backends(
        DispatchSettings::default(),
        "Be brief.",
        Arc::new(mock.clone()),
        None,
    );

    let outcome = batcher.handle_embedding_batch(["a"]).await;

    assert!(matches!(outcome, Err(BatchError::EmbeddingsUnsupported { .. })));
    assert_eq!(mock.request_count(), 0);
    assert!(!batcher.supports_embeddings());
    assert_eq!(batcher.system_prompt(), "Be brief.");
}
