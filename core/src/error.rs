// Single canonical error enum for the translation core, built with `thiserror`.
//
// Design rules:
//   - Variants are coarse-grained by domain (I/O, DB, Provider, Config…).
//   - `#[from]` wires std/external error conversions automatically.
//   - Per-tier provider failures carry enough context (provider name, status)
//     that the pipeline can classify them without re-parsing a string.

use thiserror::Error;

// ── Primary error enum ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CoreError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP / network failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// SQLite / rusqlite database failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Backend returned a quota-exhaustion signal (e.g. DeepL HTTP 456).
    #[error("Quota exceeded: {provider}: {message}")]
    QuotaExceeded { provider: String, message: String },

    /// Local budget predicate tripped for a provider.
    #[error("Budget exceeded: {provider}")]
    BudgetExceeded { provider: String },

    /// Backend returned a rate-limit response.
    #[error("Rate limited: {provider}: {message}")]
    RateLimited {
        provider: String,
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// LLM backend reported the input text exceeds its context window.
    #[error("Context window exceeded: {provider}: {message}")]
    ContextWindowExceeded { provider: String, message: String },

    /// Missing or invalid credentials for a backend.
    #[error("Auth failure: {provider}: {message}")]
    AuthFailure { provider: String, message: String },

    /// Transport error, timeout, or 5xx from a backend.
    #[error("Provider unavailable: {provider}: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// LLM backend returned a malformed JSON envelope.
    #[error("Parse failure: {provider}: {message}")]
    ParseFailure { provider: String, message: String },

    /// Every tier was skipped or failed; no cache write occurred.
    #[error("All providers exhausted: {0}")]
    AllExhausted(String),

    /// Configuration is invalid or missing a required value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catch-all for errors that do not yet have a dedicated variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenience constructors ─────────────────────────────────────────────────

impl CoreError {
    pub fn quota_exceeded(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QuotaExceeded { provider: provider.into(), message: message.into() }
    }

    pub fn budget_exceeded(provider: impl Into<String>) -> Self {
        Self::BudgetExceeded { provider: provider.into() }
    }

    pub fn rate_limited(
        provider: impl Into<String>,
        message: impl Into<String>,
        retry_after_secs: Option<u64>,
    ) -> Self {
        Self::RateLimited { provider: provider.into(), message: message.into(), retry_after_secs }
    }

    pub fn context_window_exceeded(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ContextWindowExceeded { provider: provider.into(), message: message.into() }
    }

    pub fn auth_failure(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthFailure { provider: provider.into(), message: message.into() }
    }

    pub fn provider_unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable { provider: provider.into(), message: message.into() }
    }

    pub fn parse_failure(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseFailure { provider: provider.into(), message: message.into() }
    }

    /// True for errors that represent a transient backend condition worth
    /// retrying within the same request (as opposed to auth/quota/context
    /// failures, which fail fast).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. })
    }
}

// ── Conversions ──────────────────────────────────────────────────────────────

impl From<String> for CoreError {
    fn from(s: String) -> Self {
        CoreError::Other(s)
    }
}

impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        CoreError::Other(s.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
