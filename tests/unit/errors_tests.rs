/*!
 * Tests for error types and conversions
 */

use reqwest::StatusCode;

use gpt_batch::errors::{BatchError, ProviderError};

/// Test that a forbidden status maps to an authentication error
#[test]
fn test_from_status_withForbidden_shouldBeAuthenticationError() {
    let error = ProviderError::from_status(StatusCode::FORBIDDEN, "no access");
    assert!(matches!(error, ProviderError::AuthenticationError(_)));
    assert_eq!(error.to_string(), "Authentication error: no access");
}

/// Test that provider errors convert into batch errors with `?`
#[test]
fn test_batch_error_fromProviderError_shouldWrapMessage() {
    fn build() -> Result<(), BatchError> {
        let call: Result<(), ProviderError> =
            Err(ProviderError::ConnectionError("refused".to_string()));
        call?;
        Ok(())
    }

    let error = build().unwrap_err();

    assert!(matches!(error, BatchError::Provider(ProviderError::ConnectionError(_))));
    assert!(error.to_string().contains("refused"));
}

/// Test that configuration errors name the offending value
#[test]
fn test_batch_error_display_withDetails_shouldMentionThem() {
    let unknown = BatchError::UnknownBackend {
        model: "mistral-large".to_string(),
    };
    let endpoint = BatchError::InvalidEndpoint {
        url: "localhost".to_string(),
        reason: "relative URL without a base".to_string(),
    };
    let unsupported = BatchError::EmbeddingsUnsupported {
        backend: "anthropic".to_string(),
    };

    assert!(unknown.to_string().contains("mistral-large"));
    assert!(endpoint.to_string().contains("relative URL"));
    assert!(unsupported.to_string().contains("anthropic"));
}

/// Test that errors cross into anyhow for application code
#[test]
fn test_batch_error_intoAnyhow_shouldKeepSource() {
    let error: anyhow::Error = BatchError::PoolClosed.into();
    assert!(error.downcast_ref::<BatchError>().is_some());
}
