//! Failure taxonomy for ingestion, retrieval, and answering.
//!
//! Every failure is local to one request or one ingested document. The
//! [`Engine`](crate::engine::Engine) turns the user-facing variants into an
//! [`AnswerStatus`](crate::engine::AnswerStatus) instead of propagating them.

/// Errors raised by the retrieval engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A single document could not be extracted or read.
    #[error("ingestion of '{document}' failed: {reason}")]
    Ingestion { document: String, reason: String },

    /// No documents exist at query time.
    #[error("no documents have been ingested")]
    EmptyCorpus,

    /// Retrieval found nothing above the relevance floor.
    #[error("no relevant information found")]
    NoRelevantInformation,

    /// The language-model collaborator failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A persisted index could not be loaded or does not match the store.
    #[error("index snapshot is unusable: {0}")]
    IndexCorruption(String),

    /// The document store backend failed.
    #[error("document store error: {0}")]
    Store(#[source] anyhow::Error),

    /// The embedding backend failed.
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),
}

impl Error {
    pub fn ingestion(document: impl Into<String>, reason: impl ToString) -> Self {
        Error::Ingestion {
            document: document.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failures of the hosted language-model call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("quota exceeded: {0}")]
    Quota(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("language model is disabled")]
    Disabled,
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Short, credential-free description safe to show to end users.
    pub fn sanitized(&self) -> &'static str {
        match self {
            ProviderError::Quota(_) => "quota exceeded",
            ProviderError::Auth(_) => "authentication failed",
            ProviderError::Network(_) => "network error",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Disabled => "model disabled",
            ProviderError::Malformed(_) => "unexpected response",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_drops_detail() {
        let err = ProviderError::Auth("Incorrect API key provided: sk-abc123".to_string());
        assert_eq!(err.sanitized(), "authentication failed");
        assert!(!err.sanitized().contains("sk-"));
    }

    #[test]
    fn test_provider_error_converts() {
        let err: Error = ProviderError::Timeout(30).into();
        assert!(matches!(err, Error::Provider(ProviderError::Timeout(30))));
        assert_eq!(err.to_string(), "request timed out after 30s");
    }
}
