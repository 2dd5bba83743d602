/*!
 * Tests for application configuration functionality
 */

use std::time::Duration;

use gpt_batch::app_config::{Backend, Config, LogLevel};
use gpt_batch::{BatchError, Batcher};

use crate::common;

/// Test loading a config file and turning it into dispatch settings
#[test]
fn test_from_file_withPartialConfig_shouldFillDefaultsAndConvert() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        dir.path(),
        "conf.json",
        r#"{
            "model": "gpt-4o-mini",
            "api_key": "sk-test",
            "num_workers": 16,
            "timeout_secs": 1.5,
            "log_level": "debug"
        }"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    let settings = config.dispatch_settings().unwrap();

    assert_eq!(settings.worker_count, 16);
    assert_eq!(settings.wave_timeout, Duration::from_millis(1500));
    assert_eq!(settings.retry_waves, 2);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert!(config.validate().is_ok());
}

/// Test that a saved config loads back unchanged
#[test]
fn test_save_withCustomValues_shouldLoadBackEqual() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("saved.json");
    let config = Config {
        provider: Some(Backend::Anthropic),
        model: "claude-3-5-sonnet-latest".to_string(),
        system_prompt: "Answer in French.".to_string(),
        retry_attempts: 4,
        ..Config::default()
    };

    config.save(&path).unwrap();

    assert_eq!(Config::from_file(&path).unwrap(), config);
}

/// Test that malformed JSON is reported with the file name
#[test]
fn test_from_file_withInvalidJson_shouldFailWithContext() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "broken.json", "{ not json").unwrap();

    let error = Config::from_file(&path).unwrap_err();

    assert!(format!("{:#}", error).contains("broken.json"));
}

/// Test that an unresolvable model fails at construction time
#[test]
fn test_batcher_new_withUnknownModel_shouldFailFast() {
    let config = Config {
        model: "mistral-large".to_string(),
        api_key: "key".to_string(),
        ..Config::default()
    };

    assert!(matches!(
        Batcher::new(&config),
        Err(BatchError::UnknownBackend { .. })
    ));
}

/// Test that a valid config builds a batcher with its settings
#[test]
fn test_batcher_new_withValidConfig_shouldUseConfiguredSettings() {
    let config = Config {
        api_key: "sk-test".to_string(),
        num_workers: 8,
        retry_attempts: 3,
        ..Config::default()
    };

    let batcher = Batcher::new(&config).unwrap();

    assert_eq!(batcher.settings().worker_count, 8);
    assert_eq!(batcher.settings().retry_waves, 3);
    assert!(batcher.supports_embeddings());
}

/// Test that Anthropic models build a chat-only batcher
#[test]
fn test_batcher_new_withClaudeModel_shouldNotSupportEmbeddings() {
    let config = Config {
        model: "claude-3-haiku-20240307".to_string(),
        api_key: "sk-ant-test".to_string(),
        ..Config::default()
    };

    let batcher = Batcher::new(&config).unwrap();

    assert!(!batcher.supports_embeddings());
}
