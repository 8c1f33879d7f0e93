// Environment-variable-backed settings. Required credentials are `Option`:
// a backend with a missing key reports itself unavailable rather than
// failing construction of the whole process.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub deepl_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub google_application_credentials: Option<String>,
    pub google_cloud_project: Option<String>,
    pub google_access_token: Option<String>,

    pub sqlite_db_path: String,

    pub daily_budget_google: f64,
    pub daily_budget_openai: f64,

    pub api_host: String,
    pub api_port: u16,
    pub log_level: String,

    pub openai_translation_model: String,
    pub openai_refinement_model: String,

    pub openai_price_input: f64,
    pub openai_price_output: f64,
    pub google_price_per_million_chars: f64,

    pub cache_expire_days: i64,
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// documented defaults for anything absent or unparsable.
    pub fn from_env() -> Self {
        Self {
            deepl_api_key: env::var("DEEPL_API_KEY").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            google_application_credentials: env::var("GOOGLE_APPLICATION_CREDENTIALS").ok(),
            google_cloud_project: env::var("GOOGLE_CLOUD_PROJECT").ok(),
            google_access_token: env::var("GOOGLE_ACCESS_TOKEN").ok(),

            sqlite_db_path: env_or("SQLITE_DB_PATH", "./data/tps.db"),

            daily_budget_google: env_parsed_or("DAILY_BUDGET_GOOGLE", 10.0),
            daily_budget_openai: env_parsed_or("DAILY_BUDGET_OPENAI", 5.0),

            api_host: env_or("API_HOST", "0.0.0.0"),
            api_port: env_parsed_or("API_PORT", 8000),
            log_level: env_or("LOG_LEVEL", "info"),

            openai_translation_model: env_or("OPENAI_TRANSLATION_MODEL", "gpt-4o-mini"),
            openai_refinement_model: env_or("OPENAI_REFINEMENT_MODEL", "gpt-4o-mini"),

            openai_price_input: 0.15,
            openai_price_output: 0.60,
            google_price_per_million_chars: 20.0,

            cache_expire_days: env_parsed_or("CACHE_EXPIRE_DAYS", 90),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("[config] {key}={raw:?} failed to parse, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env_overrides() {
        // SAFETY: test-only, single-threaded access to a key nothing else sets.
        unsafe {
            env::remove_var("SQLITE_DB_PATH");
            env::remove_var("DAILY_BUDGET_GOOGLE");
        }
        let cfg = Config::from_env();
        assert_eq!(cfg.sqlite_db_path, "./data/tps.db");
        assert_eq!(cfg.daily_budget_google, 10.0);
        assert_eq!(cfg.daily_budget_openai, 5.0);
        assert_eq!(cfg.cache_expire_days, 90);
        assert_eq!(cfg.openai_translation_model, "gpt-4o-mini");
    }
}
