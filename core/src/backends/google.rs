// Cloud MT backend (Google Cloud Translation v3, REST). Tier 3 — last
// resort, no free quota beyond the monthly 500k characters tracked in usage.
//
// The teacher's dependency stack carries no Google Cloud SDK, and obtaining
// a service-account OAuth2 token requires a JWT-signing flow this crate does
// not implement. Instead the caller supplies a pre-minted bearer token (e.g.
// the output of `gcloud auth print-access-token`, or a token refreshed by an
// external sidecar) via `GOOGLE_ACCESS_TOKEN`. See DESIGN.md.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde_json::json;

use crate::error::{CoreError, CoreResult};
use crate::http::{is_retryable_status, parse_retry_after, retry_delay, CircuitBreaker, MAX_RETRIES};
use crate::types::TranslationResult;

use super::Backend;

static GOOGLE_CIRCUIT: LazyLock<CircuitBreaker> = LazyLock::new(|| CircuitBreaker::new(5, 60));

/// BCP-47 mapping; anything not listed passes through lowercased.
fn map_language(lang: &str) -> String {
    match lang.to_lowercase().as_str() {
        "zh-tw" => "zh-TW".to_string(),
        "zh-cn" => "zh-CN".to_string(),
        "zh" => "zh-CN".to_string(),
        "pt-br" => "pt-BR".to_string(),
        other => other.to_string(),
    }
}

pub struct GoogleBackend {
    client: Client,
    access_token: Option<String>,
    project_id: Option<String>,
    price_per_million_chars: f64,
}

impl GoogleBackend {
    pub fn new(access_token: Option<String>, project_id: Option<String>, price_per_million_chars: f64) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            access_token,
            project_id,
            price_per_million_chars,
        }
    }
}

#[async_trait]
impl Backend for GoogleBackend {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn available(&self) -> bool {
        self.access_token.is_some() && self.project_id.is_some()
    }

    async fn translate(&self, text: &str, source_lang: Option<&str>, target_lang: &str) -> CoreResult<TranslationResult> {
        let token = self
            .access_token
            .as_ref()
            .ok_or_else(|| CoreError::auth_failure("google", "Google access token not configured"))?;
        let project_id = self
            .project_id
            .as_ref()
            .ok_or_else(|| CoreError::auth_failure("google", "Google Cloud project ID not found"))?;

        if let Err(msg) = GOOGLE_CIRCUIT.check() {
            return Err(CoreError::provider_unavailable("google", msg));
        }

        let url = format!("https://translation.googleapis.com/v3/projects/{project_id}/locations/global:translateText");

        let mut body = json!({
            "contents": [text],
            "mimeType": "text/plain",
            "targetLanguageCode": map_language(target_lang),
        });
        if let Some(src) = source_lang {
            body["sourceLanguageCode"] = json!(map_language(src));
        }

        let mut last_error = String::new();
        let mut retry_after: Option<u64> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = retry_delay(attempt - 1, retry_after.take()).await;
                warn!("[google] retry {}/{} after {}ms", attempt, MAX_RETRIES, delay.as_millis());
            }

            let response = match self
                .client
                .post(&url)
                .bearer_auth(token)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    GOOGLE_CIRCUIT.record_failure();
                    last_error = format!("transport error: {e}");
                    if attempt < MAX_RETRIES {
                        continue;
                    }
                    return Err(CoreError::provider_unavailable("google", last_error));
                }
            };

            let status = response.status().as_u16();
            if status == 200 {
                let envelope: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|e| CoreError::parse_failure("google", e.to_string()))?;
                let translated_text = envelope["translations"][0]["translatedText"]
                    .as_str()
                    .ok_or_else(|| CoreError::parse_failure("google", "missing translations[0].translatedText"))?
                    .to_string();

                GOOGLE_CIRCUIT.record_success();
                let char_count = text.chars().count() as i64;
                return Ok(TranslationResult {
                    text: translated_text,
                    provider: "google".to_string(),
                    char_count,
                    token_input: 0,
                    token_output: 0,
                    cost_estimated: (char_count as f64 / 1_000_000.0) * self.price_per_million_chars,
                });
            }

            retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body_text = response.text().await.unwrap_or_default();
            last_error = format!("API error {status}: {body_text}");
            GOOGLE_CIRCUIT.record_failure();

            let lowered = body_text.to_lowercase();
            if status == 401 || status == 403 || lowered.contains("permission") || lowered.contains("auth") || lowered.contains("credential") {
                return Err(CoreError::auth_failure("google", last_error));
            }
            if status == 429 {
                if attempt < MAX_RETRIES {
                    continue;
                }
                return Err(CoreError::rate_limited("google", last_error, retry_after.take()));
            }
            if is_retryable_status(status) && attempt < MAX_RETRIES {
                continue;
            }
            return Err(CoreError::provider_unavailable("google", last_error));
        }

        Err(CoreError::provider_unavailable("google", last_error))
    }
}
