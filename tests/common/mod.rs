/*!
 * Common test utilities for the gpt-batch test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use gpt_batch::batch::DispatchSettings;
use gpt_batch::providers::mock::MockProvider;
use gpt_batch::Batcher;

/// Route library logs to the test output; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Dispatch settings with a short wave timeout so hanging cases finish quickly
pub fn fast_settings(worker_count: usize, retry_waves: usize) -> DispatchSettings {
    DispatchSettings::new(worker_count, Duration::from_millis(100), retry_waves)
        .expect("test settings should be valid")
}

/// A batcher whose chat and embedding backends are both `mock`
pub fn mock_batcher(mock: MockProvider, settings: DispatchSettings) -> Batcher {
    let mock = Arc::new(mock);
    Batcher::with_backends(settings, "", mock.clone(), Some(mock))
}

/// `["item-0", "item-1", ...]`
pub fn numbered_inputs(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("item-{}", i)).collect()
}
