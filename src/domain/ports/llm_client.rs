//! LLM client port - interface for chat-completion backends.

use async_trait::async_trait;

use crate::domain::ports::errors::{SyndicateError, SyndicateResult};

/// A chat-completion backend used by the `chat` ability.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Whether the backend is configured and reachable in principle.
    fn is_available(&self) -> bool;

    /// Completes a prompt, optionally overriding the configured model.
    async fn complete(&self, prompt: &str, model: Option<&str>) -> SyndicateResult<String>;
}

/// Null backend used when no provider is configured.
///
/// Callers get a dependency-missing error they can degrade on; the
/// process never aborts over an absent LLM.
#[derive(Debug, Default)]
pub struct NullLlmClient;

#[async_trait]
impl LlmClient for NullLlmClient {
    fn name(&self) -> &'static str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn complete(&self, _prompt: &str, _model: Option<&str>) -> SyndicateResult<String> {
        Err(SyndicateError::DependencyMissing(
            "no LLM provider configured".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_client_reports_dependency_missing() {
        let client = NullLlmClient;
        assert!(!client.is_available());
        let err = tokio_test::block_on(client.complete("hello", None)).unwrap_err();
        assert!(matches!(err, SyndicateError::DependencyMissing(_)));
    }
}
