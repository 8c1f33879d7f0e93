// Uniform contract over the three external translation services.

pub mod deepl;
pub mod google;
pub mod openai;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{RefinementResult, TranslationResult};

#[async_trait]
pub trait Backend: Send + Sync {
    /// The usage-ledger provider name this backend writes under
    /// (`deepl`, `openai_trans` for translate, `google`).
    fn name(&self) -> &'static str;

    /// Cheap configuration/reachability probe; never performs a translation.
    async fn available(&self) -> bool;

    async fn translate(&self, text: &str, source_lang: Option<&str>, target_lang: &str) -> CoreResult<TranslationResult>;
}

/// Exposed only by the LLM backend.
#[async_trait]
pub trait Refiner: Send + Sync {
    async fn refine(
        &self,
        original: &str,
        draft: &str,
        source_lang: &str,
        target_lang: &str,
        model: Option<&str>,
    ) -> CoreResult<RefinementResult>;
}
