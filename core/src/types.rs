// Plain data types shared across the store, backends, and pipeline.

use serde::{Deserialize, Serialize};

/// One cache entry as stored in (and read back from) the `translations` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTranslation {
    pub cache_key: String,
    pub source_lang: String,
    pub target_lang: String,
    pub original_text: String,
    pub translated_text: String,
    pub provider: String,
    pub is_refined: bool,
    pub refinement_model: Option<String>,
    pub char_count: i64,
    pub created_at: String,
    pub last_accessed_at: String,
    pub expires_at: Option<String>,
}

/// Per-(date, provider) usage counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyUsageStats {
    pub date: String,
    pub provider: String,
    pub request_count: i64,
    pub char_count: i64,
    pub token_input: i64,
    pub token_output: i64,
    pub cost_estimated: f64,
}

/// Filter parameters for [`crate::store::cache_repo::CacheRepo::paginated`].
#[derive(Debug, Clone, Default)]
pub struct CacheFilter {
    pub search_query: Option<String>,
    pub providers: Option<Vec<String>>,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub is_refined: Option<bool>,
    pub page: u32,
    pub page_size: u32,
}

/// Distinct source/target language codes present in the cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailableLanguages {
    pub source_languages: Vec<String>,
    pub target_languages: Vec<String>,
}

/// Supported preferred-provider hints (`auto` lets the pipeline pick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredProvider {
    Auto,
    Deepl,
    Openai,
    Google,
}

impl Default for PreferredProvider {
    fn default() -> Self {
        Self::Auto
    }
}

/// Per-request translation options (spec's "config object with many named
/// parameters" collapsed into one record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationOptions {
    #[serde(default = "default_format")]
    pub format_type: String,
    #[serde(default)]
    pub enable_refinement: bool,
    #[serde(default)]
    pub refinement_model: Option<String>,
    #[serde(default)]
    pub preferred_provider: PreferredProvider,
}

fn default_format() -> String {
    "plain".to_string()
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            format_type: default_format(),
            enable_refinement: false,
            refinement_model: None,
            preferred_provider: PreferredProvider::Auto,
        }
    }
}

/// The result of one `Pipeline::translate` call — never a crash, always this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub success: bool,
    pub text: Option<String>,
    pub provider: Option<String>,
    #[serde(default)]
    pub is_refined: bool,
    #[serde(default)]
    pub is_cached: bool,
    pub error: Option<String>,
}

impl TranslationResponse {
    pub fn ok(text: String, provider: impl Into<String>, is_refined: bool, is_cached: bool) -> Self {
        Self {
            success: true,
            text: Some(text),
            provider: Some(provider.into()),
            is_refined,
            is_cached,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            text: None,
            provider: None,
            is_refined: false,
            is_cached: false,
            error: Some(message.into()),
        }
    }
}

/// What a backend's `translate` call returns on success.
#[derive(Debug, Clone)]
pub struct TranslationResult {
    pub text: String,
    pub provider: String,
    pub char_count: i64,
    pub token_input: i64,
    pub token_output: i64,
    pub cost_estimated: f64,
}

/// What a backend's `refine` call returns on success.
#[derive(Debug, Clone)]
pub struct RefinementResult {
    pub text: String,
    pub model: String,
    pub token_input: i64,
    pub token_output: i64,
    pub cost_estimated: f64,
}

/// The fixed closed set of usage-ledger providers (distinct from backend
/// names: the LLM backend splits into `openai_trans`/`openai_refine`).
pub mod provider_names {
    pub const DEEPL: &str = "deepl";
    pub const GOOGLE: &str = "google";
    pub const OPENAI_TRANS: &str = "openai_trans";
    pub const OPENAI_REFINE: &str = "openai_refine";
    pub const CACHE: &str = "cache";
}
