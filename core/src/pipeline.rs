// Multi-tier translation orchestrator: cache -> DeepL -> OpenAI -> Google,
// with optional LLM refinement. Never panics and never propagates an error
// to the caller — every path returns a `TranslationResponse`.

use log::{error, info, warn};

use crate::backends::{Backend, Refiner};
use crate::cost_control::CostController;
use crate::fingerprint::generate_cache_key;
use crate::store::cache_repo::{CacheRepo, UpsertFields};
use crate::store::Store;
use crate::types::{provider_names, TranslationOptions, TranslationResponse, TranslationResult};

pub struct Pipeline {
    store: Store,
    cost_controller: CostController,
    deepl: Box<dyn Backend>,
    openai: Box<dyn Backend>,
    google: Box<dyn Backend>,
    refiner: Box<dyn Refiner>,
}

// ── Public entry points ──────────────────────────────────────────────────────

impl Pipeline {
    pub fn new(
        store: Store,
        cost_controller: CostController,
        deepl: Box<dyn Backend>,
        openai: Box<dyn Backend>,
        google: Box<dyn Backend>,
        refiner: Box<dyn Refiner>,
    ) -> Self {
        Self { store, cost_controller, deepl, openai, google, refiner }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn cost_controller(&self) -> &CostController {
        &self.cost_controller
    }

    pub async fn translate(&self, text: &str, source_lang: &str, target_lang: &str, options: &TranslationOptions) -> TranslationResponse {
        let cache_key = generate_cache_key(text, source_lang, target_lang, Some(&options.format_type));
        let cache = CacheRepo::new(&self.store);

        match cache.get(&cache_key) {
            Ok(Some(cached)) if !options.enable_refinement || cached.is_refined => {
                if let Err(e) = cache.touch(&cache_key) {
                    warn!("[pipeline] failed to touch cache row: {e}");
                }
                info!("[pipeline] cache hit for key {}...", &cache_key[..8.min(cache_key.len())]);
                return TranslationResponse::ok(cached.translated_text, provider_names::CACHE, cached.is_refined, true);
            }
            Ok(_) => {}
            Err(e) => {
                error!("[pipeline] cache lookup failed: {e}");
            }
        }

        let (result, provider_used) = match self.execute_translation_chain(text, source_lang, target_lang).await {
            Some(pair) => pair,
            None => {
                return TranslationResponse::failure("All translation providers failed or exceeded budget");
            }
        };

        let mut translated_text = result.text;
        let mut is_refined = false;

        if options.enable_refinement && provider_used != provider_names::OPENAI_TRANS {
            if let Some(refined) = self
                .try_refinement(text, &translated_text, source_lang, target_lang, options.refinement_model.as_deref())
                .await
            {
                translated_text = refined;
                is_refined = true;
            }
        }

        if let Err(e) = cache.upsert(
            &cache_key,
            UpsertFields {
                source_lang,
                target_lang,
                original_text: text,
                translated_text: &translated_text,
                provider: provider_used,
                is_refined,
                refinement_model: if is_refined { options.refinement_model.as_deref() } else { None },
            },
        ) {
            error!("[pipeline] failed to write cache row: {e}");
        }

        TranslationResponse::ok(translated_text, provider_used, is_refined, false)
    }

    // ── Tier-walk & refinement helpers ───────────────────────────────────────

    /// Tries DeepL, then OpenAI, then Google, in that order. Returns the
    /// first success along with the usage-ledger provider name it should be
    /// recorded and cached under.
    async fn execute_translation_chain(&self, text: &str, source_lang: &str, target_lang: &str) -> Option<(TranslationResult, &'static str)> {
        if !self.cost_controller.is_quota_exceeded(provider_names::DEEPL) && self.deepl.available().await {
            match self.deepl.translate(text, Some(source_lang), target_lang).await {
                Ok(result) => {
                    if let Err(e) = self.cost_controller.record_usage(&self.store, provider_names::DEEPL, result.char_count, 0, 0, 0.0) {
                        error!("[pipeline] failed to record deepl usage: {e}");
                    }
                    info!("[pipeline] deepl translation successful ({} chars)", result.char_count);
                    return Some((result, provider_names::DEEPL));
                }
                Err(crate::error::CoreError::QuotaExceeded { .. }) => {
                    self.cost_controller.set_quota_exceeded(provider_names::DEEPL);
                    warn!("[pipeline] deepl quota exceeded, switching to fallback");
                }
                Err(e) => warn!("[pipeline] deepl failed: {e}"),
            }
        }

        match self.cost_controller.is_llm_budget_exceeded(&self.store) {
            Ok(false) if self.openai.available().await => {
                match self.openai.translate(text, Some(source_lang), target_lang).await {
                    Ok(result) => {
                        if let Err(e) = self.cost_controller.record_usage(
                            &self.store,
                            provider_names::OPENAI_TRANS,
                            0,
                            result.token_input,
                            result.token_output,
                            result.cost_estimated,
                        ) {
                            error!("[pipeline] failed to record openai usage: {e}");
                        }
                        info!("[pipeline] openai translation successful ({}+{} tokens)", result.token_input, result.token_output);
                        return Some((result, provider_names::OPENAI_TRANS));
                    }
                    Err(e) => warn!("[pipeline] openai translation failed: {e}"),
                }
            }
            Ok(false) => {}
            Ok(true) => warn!("[pipeline] openai budget exceeded, skipping"),
            Err(e) => error!("[pipeline] failed to check openai budget: {e}"),
        }

        match self.cost_controller.is_budget_exceeded(&self.store, provider_names::GOOGLE) {
            Ok(false) if self.google.available().await => {
                match self.google.translate(text, Some(source_lang), target_lang).await {
                    Ok(result) => {
                        if let Err(e) = self.cost_controller.record_usage(
                            &self.store,
                            provider_names::GOOGLE,
                            result.char_count,
                            0,
                            0,
                            result.cost_estimated,
                        ) {
                            error!("[pipeline] failed to record google usage: {e}");
                        }
                        info!("[pipeline] google translation successful ({} chars)", result.char_count);
                        return Some((result, provider_names::GOOGLE));
                    }
                    Err(e) => warn!("[pipeline] google failed: {e}"),
                }
            }
            Ok(false) => {}
            Ok(true) => warn!("[pipeline] google budget exceeded, skipping"),
            Err(e) => error!("[pipeline] failed to check google budget: {e}"),
        }

        None
    }

    /// Returns `None` (never an error) if the budget is exceeded or
    /// refinement itself fails; the draft translation is used as-is.
    async fn try_refinement(&self, original: &str, draft: &str, source_lang: &str, target_lang: &str, model: Option<&str>) -> Option<String> {
        match self.cost_controller.is_llm_budget_exceeded(&self.store) {
            Ok(true) => {
                warn!("[pipeline] openai budget exceeded, skipping refinement");
                return None;
            }
            Err(e) => {
                error!("[pipeline] failed to check refinement budget: {e}");
                return None;
            }
            Ok(false) => {}
        }

        match self.refiner.refine(original, draft, source_lang, target_lang, model).await {
            Ok(result) => {
                if let Err(e) = self.cost_controller.record_usage(
                    &self.store,
                    provider_names::OPENAI_REFINE,
                    0,
                    result.token_input,
                    result.token_output,
                    result.cost_estimated,
                ) {
                    error!("[pipeline] failed to record refinement usage: {e}");
                }
                info!("[pipeline] refinement successful ({}+{} tokens)", result.token_input, result.token_output);
                Some(result.text)
            }
            Err(e) => {
                warn!("[pipeline] refinement failed: {e}");
                None
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
