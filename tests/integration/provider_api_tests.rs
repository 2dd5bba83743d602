/*!
 * Integration tests against the live provider APIs
 *
 * These tests are ignored by default. Run them with
 * `OPENAI_API_KEY=... ANTHROPIC_API_KEY=... cargo test -- --ignored`.
 */

use anyhow::Result;
use std::env;

use gpt_batch::app_config::Config;
use gpt_batch::Batcher;

use crate::common;

fn live_config(key_var: &str, model: &str) -> Option<Config> {
    let api_key = env::var(key_var).ok().filter(|key| !key.is_empty())?;
    Some(Config {
        model: model.to_string(),
        api_key,
        num_workers: 4,
        timeout_secs: 30.0,
        temperature: 0.0,
        system_prompt: "Reply with the number only.".to_string(),
        ..Config::default()
    })
}

/// Test a small chat batch against OpenAI
#[tokio::test]
#[ignore]
async fn test_openai_generate_withLiveApi_shouldAnswerEveryItem() -> Result<()> {
    common::init_logging();
    let Some(config) = live_config("OPENAI_API_KEY", "gpt-4o-mini") else {
        return Ok(());
    };
    let batcher = Batcher::new(&config)?;

    let report = batcher.run_text_batch(["1 + 1", "2 + 2", "3 + 3"]).await?;

    assert_eq!(report.len(), 3);
    assert!(report.missed.is_empty(), "missed: {:?}", report.missed);
    assert!(report.values[1].as_deref().unwrap_or_default().contains('4'));
    Ok(())
}

/// Test a small embedding batch against OpenAI
#[tokio::test]
#[ignore]
async fn test_openai_embed_withLiveApi_shouldReturnVectors() -> Result<()> {
    let Some(config) = live_config("OPENAI_API_KEY", "text-embedding-3-small") else {
        return Ok(());
    };
    let batcher = Batcher::new(&config)?;

    let values = batcher.handle_embedding_batch(["hello", "world"]).await?;

    assert!(values.iter().all(|v| v.as_ref().is_some_and(|v| !v.is_empty())));
    Ok(())
}

/// Test a small chat batch against Anthropic
#[tokio::test]
#[ignore]
async fn test_anthropic_generate_withLiveApi_shouldAnswerEveryItem() -> Result<()> {
    let Some(config) = live_config("ANTHROPIC_API_KEY", "claude-3-haiku-20240307") else {
        return Ok(());
    };
    let batcher = Batcher::new(&config)?;

    let values = batcher.handle_text_batch(["5 + 5"]).await?;

    assert!(values[0].as_deref().unwrap_or_default().contains("10"));
    Ok(())
}

/// Test that a rejected key becomes a hole rather than an aborted run
#[tokio::test]
#[ignore]
async fn test_openai_generate_withInvalidKey_shouldMissEveryItem() -> Result<()> {
    let config = Config {
        api_key: "sk-invalid".to_string(),
        num_workers: 2,
        ..Config::default()
    };
    let batcher = Batcher::new(&config)?;

    let report = batcher.run_text_batch(["a", "b"]).await?;

    assert_eq!(report.missed, vec![0, 1]);
    Ok(())
}
