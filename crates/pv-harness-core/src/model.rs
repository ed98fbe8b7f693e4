//! Language-model seam.
//!
//! The engine only needs one call: send system instructions plus a composed
//! prompt and get text back. Providers map their own failures onto
//! [`ProviderError`] so the engine can degrade to a `provider_error` answer
//! without knowing which backend failed.

use async_trait::async_trait;

use crate::error::ProviderError;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider/model label for logs.
    fn name(&self) -> &str;

    /// Produce a completion for `prompt` under `system` instructions.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Model used when no provider is configured; every call fails with
/// [`ProviderError::Disabled`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Disabled)
    }
}
