//! Chat-completion provider trait.

use async_trait::async_trait;

use crate::error::Result;

/// A service that turns a system prompt and a user prompt into an answer.
///
/// The answer synthesizer treats every error from this trait as a signal to
/// use its deterministic fallback renderer, so implementations should fail
/// fast rather than retry.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Generate a completion for the given system and user messages.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}
