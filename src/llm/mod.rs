pub mod gemini;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Fast,
    Strong,
}

/// Sends one prompt, returns the raw completion text.
///
/// Only transport-level failures are errors here; whether the text is usable
/// is decided by the response extractor.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, tier: ModelTier) -> Result<String, LlmError>;
}
