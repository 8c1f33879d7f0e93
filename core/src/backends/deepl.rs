// Specialized neural MT backend (DeepL REST API). Tier 1 — lowest cost,
// consumes a monthly free character quota.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::Client;
use serde_json::json;

use crate::error::{CoreError, CoreResult};
use crate::http::{is_retryable_status, parse_retry_after, retry_delay, CircuitBreaker, MAX_RETRIES};
use crate::types::TranslationResult;

use super::Backend;

static DEEPL_CIRCUIT: LazyLock<CircuitBreaker> = LazyLock::new(|| CircuitBreaker::new(5, 60));

const API_URL: &str = "https://api-free.deepl.com/v2/translate";

/// Generic language code -> DeepL dialect tag.
fn map_language(lang: &str, is_target: bool) -> String {
    let lower = lang.to_lowercase();
    let mapped = match lower.as_str() {
        "en" => "EN",
        "zh" => "ZH",
        "zh-tw" => "ZH-HANT",
        "zh-cn" => "ZH-HANS",
        "ja" => "JA",
        "ko" => "KO",
        "de" => "DE",
        "fr" => "FR",
        "es" => "ES",
        "it" => "IT",
        "pt" => "PT-PT",
        "pt-br" => "PT-BR",
        "ru" => "RU",
        "nl" => "NL",
        "pl" => "PL",
        _ => return lang.to_uppercase(),
    };
    if is_target && mapped == "EN" {
        "EN-US".to_string()
    } else {
        mapped.to_string()
    }
}

pub struct DeeplBackend {
    client: Client,
    api_key: Option<String>,
}

impl DeeplBackend {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key,
        }
    }
}

#[async_trait]
impl Backend for DeeplBackend {
    fn name(&self) -> &'static str {
        "deepl"
    }

    async fn available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn translate(&self, text: &str, source_lang: Option<&str>, target_lang: &str) -> CoreResult<TranslationResult> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| CoreError::auth_failure("deepl", "DeepL API key not configured"))?;

        if let Err(msg) = DEEPL_CIRCUIT.check() {
            return Err(CoreError::provider_unavailable("deepl", msg));
        }

        let source = source_lang.map(|l| map_language(l, false));
        let target = map_language(target_lang, true);

        let mut body = json!({
            "text": [text],
            "target_lang": target,
            "preserve_formatting": true,
        });
        if let Some(src) = &source {
            body["source_lang"] = json!(src);
        }

        let mut last_error = String::new();
        let mut last_status: u16 = 0;
        let mut retry_after: Option<u64> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = retry_delay(attempt - 1, retry_after.take()).await;
                warn!("[deepl] retry {}/{} after {}ms", attempt, MAX_RETRIES, delay.as_millis());
            }

            let response = match self
                .client
                .post(API_URL)
                .header("Authorization", format!("DeepL-Auth-Key {api_key}"))
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    DEEPL_CIRCUIT.record_failure();
                    last_error = format!("transport error: {e}");
                    if attempt < MAX_RETRIES {
                        continue;
                    }
                    return Err(CoreError::provider_unavailable("deepl", last_error));
                }
            };

            let status = response.status().as_u16();
            if status == 200 {
                let body: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|e| CoreError::parse_failure("deepl", e.to_string()))?;
                let translated_text = body["translations"][0]["text"]
                    .as_str()
                    .ok_or_else(|| CoreError::parse_failure("deepl", "missing translations[0].text"))?
                    .to_string();

                DEEPL_CIRCUIT.record_success();
                return Ok(TranslationResult {
                    text: translated_text,
                    provider: "deepl".to_string(),
                    char_count: text.chars().count() as i64,
                    token_input: 0,
                    token_output: 0,
                    cost_estimated: 0.0,
                });
            }

            last_status = status;
            retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body_text = response.text().await.unwrap_or_default();
            last_error = format!("API error {status}: {body_text}");
            error!("[deepl] error {status}: {body_text}");

            DEEPL_CIRCUIT.record_failure();

            // DeepL signals quota exhaustion with HTTP 456.
            if status == 456 {
                return Err(CoreError::quota_exceeded("deepl", last_error));
            }
            if status == 401 || status == 403 {
                return Err(CoreError::auth_failure("deepl", last_error));
            }
            if is_retryable_status(status) && attempt < MAX_RETRIES {
                continue;
            }
            return if status == 429 {
                Err(CoreError::rate_limited("deepl", last_error, retry_after.take()))
            } else {
                Err(CoreError::provider_unavailable("deepl", last_error))
            };
        }

        info!("[deepl] retries exhausted, last_status={last_status}");
        Err(CoreError::provider_unavailable("deepl", last_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_languages() {
        assert_eq!(map_language("en", false), "EN");
        assert_eq!(map_language("zh-tw", false), "ZH-HANT");
        assert_eq!(map_language("zh-cn", false), "ZH-HANS");
    }

    #[test]
    fn target_english_disambiguates_to_en_us() {
        assert_eq!(map_language("en", true), "EN-US");
        assert_eq!(map_language("en", false), "EN");
    }

    #[test]
    fn unknown_language_falls_back_to_uppercase() {
        assert_eq!(map_language("xx", false), "XX");
    }

    #[tokio::test]
    async fn unavailable_without_api_key() {
        let backend = DeeplBackend::new(None);
        assert!(!backend.available().await);
    }

    #[tokio::test]
    async fn translate_without_api_key_is_auth_failure() {
        let backend = DeeplBackend::new(None);
        let err = backend.translate("Hello", Some("en"), "zh-tw").await.unwrap_err();
        assert!(matches!(err, CoreError::AuthFailure { .. }));
    }
}
