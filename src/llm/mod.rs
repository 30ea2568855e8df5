//! Language-model seam
//!
//! Every prompt in the crate goes through [`LanguageModel::invoke`]: query
//! synthesis, re-ranking, grounded disclosure and profile intake. Providers
//! make no structured-output promise, so replies are free text and callers
//! use [`parse`] to pull JSON out of them.

use crate::Result;
use async_trait::async_trait;

pub mod gemini;
pub mod groq;
pub mod mock;
pub mod parse;

pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use mock::ScriptedModel;

/// Text-in, text-out language model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider label for logs
    fn name(&self) -> &str;

    async fn invoke(&self, prompt: &str) -> Result<String>;
}
