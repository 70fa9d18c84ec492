//! Model-invocation boundary.

use async_trait::async_trait;

/// An inference backend the dispatch loop can call.
///
/// The loop sends one fully rendered prompt per iteration and receives the
/// raw model text back; no streaming or message-role structure is required at
/// this boundary.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send `prompt` and return the raw completion text.
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;

    fn name(&self) -> &str;
}
