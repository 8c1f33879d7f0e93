// General LLM backend (OpenAI Chat Completions). Tier 2 for translation,
// and the only backend that exposes refinement.

use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde_json::{json, Value};
use tiktoken_rs::CoreBPE;

use crate::error::{CoreError, CoreResult};
use crate::http::{is_retryable_status, parse_retry_after, retry_delay, CircuitBreaker, MAX_RETRIES};
use crate::types::{RefinementResult, TranslationResult};

use super::{Backend, Refiner};

static OPENAI_CIRCUIT: LazyLock<CircuitBreaker> = LazyLock::new(|| CircuitBreaker::new(5, 60));
static ENCODER: OnceLock<CoreBPE> = OnceLock::new();

const API_URL: &str = "https://api.openai.com/v1/chat/completions";

const TRANSLATION_SYSTEM_PROMPT: &str = "You are a professional translator API. Your task is to translate the user's text accurately.

Rules:
1. Translate from {source_lang} to {target_lang}
2. Preserve ALL HTML tags exactly as they appear
3. Preserve ALL variables (e.g., {{name}}, {{0}}, %s) exactly as they appear
4. Do not add explanations or notes
5. Return ONLY the translated text, nothing else

Respond with a JSON object: {\"translation\": \"your translated text here\"}";

const REFINEMENT_SYSTEM_PROMPT: &str = "You are a localization expert specializing in making translations sound natural and fluent.

Your task is to improve the draft translation for better readability while maintaining accuracy.

Rules:
1. Keep technical terms and proper nouns consistent
2. Improve naturalness and flow without changing the meaning
3. Preserve ALL HTML tags and variables exactly
4. Do not add explanations

Respond with a JSON object: {\"refined\": \"your refined translation here\"}";

fn encoder() -> &'static CoreBPE {
    ENCODER.get_or_init(|| tiktoken_rs::cl100k_base().expect("cl100k_base vocabulary is bundled"))
}

fn count_tokens(text: &str) -> i64 {
    encoder().encode_ordinary(text).len() as i64
}

pub struct OpenaiBackend {
    client: Client,
    api_key: Option<String>,
    translation_model: String,
    refinement_model: String,
    price_input: f64,
    price_output: f64,
}

impl OpenaiBackend {
    pub fn new(
        api_key: Option<String>,
        translation_model: String,
        refinement_model: String,
        price_input: f64,
        price_output: f64,
    ) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key,
            translation_model,
            refinement_model,
            price_input,
            price_output,
        }
    }

    fn estimate_cost(&self, input_tokens: i64, output_tokens: i64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.price_input
            + (output_tokens as f64 / 1_000_000.0) * self.price_output
    }

    async fn chat_completion(&self, model: &str, system_prompt: &str, user_content: &str, temperature: f64) -> CoreResult<(String, i64, i64)> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| CoreError::auth_failure("openai", "OpenAI API key not configured"))?;

        if let Err(msg) = OPENAI_CIRCUIT.check() {
            return Err(CoreError::provider_unavailable("openai", msg));
        }

        let input_tokens = count_tokens(system_prompt) + count_tokens(user_content);
        let max_tokens = (input_tokens * 2).max(1000);

        let body = json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_content},
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
            "response_format": {"type": "json_object"},
        });

        let mut last_error = String::new();
        let mut retry_after: Option<u64> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = retry_delay(attempt - 1, retry_after.take()).await;
                warn!("[openai] retry {}/{} after {}ms", attempt, MAX_RETRIES, delay.as_millis());
            }

            let response = match self
                .client
                .post(API_URL)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    OPENAI_CIRCUIT.record_failure();
                    last_error = format!("transport error: {e}");
                    if attempt < MAX_RETRIES {
                        continue;
                    }
                    return Err(CoreError::provider_unavailable("openai", last_error));
                }
            };

            let status = response.status().as_u16();
            if status == 200 {
                let envelope: Value = response
                    .json()
                    .await
                    .map_err(|e| CoreError::parse_failure("openai", e.to_string()))?;
                OPENAI_CIRCUIT.record_success();

                let content = envelope["choices"][0]["message"]["content"]
                    .as_str()
                    .ok_or_else(|| CoreError::parse_failure("openai", "missing choices[0].message.content"))?
                    .to_string();

                let token_input = envelope["usage"]["prompt_tokens"].as_i64().unwrap_or(input_tokens);
                let token_output = envelope["usage"]["completion_tokens"]
                    .as_i64()
                    .unwrap_or_else(|| count_tokens(&content));

                return Ok((content, token_input, token_output));
            }

            retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body_text = response.text().await.unwrap_or_default();
            last_error = format!("API error {status}: {body_text}");
            OPENAI_CIRCUIT.record_failure();

            if status == 401 || status == 403 {
                return Err(CoreError::auth_failure("openai", last_error));
            }
            if status == 429 {
                if attempt < MAX_RETRIES {
                    continue;
                }
                return Err(CoreError::rate_limited("openai", last_error, retry_after.take()));
            }
            if body_text.to_lowercase().contains("context_length_exceeded") || body_text.to_lowercase().contains("context length") {
                return Err(CoreError::context_window_exceeded("openai", last_error));
            }
            if is_retryable_status(status) && attempt < MAX_RETRIES {
                continue;
            }
            return Err(CoreError::provider_unavailable("openai", last_error));
        }

        Err(CoreError::provider_unavailable("openai", last_error))
    }
}

#[async_trait]
impl Backend for OpenaiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn translate(&self, text: &str, source_lang: Option<&str>, target_lang: &str) -> CoreResult<TranslationResult> {
        let source = source_lang.unwrap_or("auto");
        let system_prompt = TRANSLATION_SYSTEM_PROMPT
            .replace("{source_lang}", source)
            .replace("{target_lang}", target_lang);
        let user_content = json!({ "text": text }).to_string();

        let (content, token_input, token_output) =
            self.chat_completion(&self.translation_model, &system_prompt, &user_content, 0.1).await?;

        let translated_text = match serde_json::from_str::<Value>(&content) {
            Ok(parsed) => parsed["translation"].as_str().map(str::to_string).unwrap_or_else(|| content.clone()),
            Err(_) => content.trim().to_string(),
        };

        Ok(TranslationResult {
            text: translated_text,
            provider: "openai".to_string(),
            char_count: text.chars().count() as i64,
            token_input,
            token_output,
            cost_estimated: self.estimate_cost(token_input, token_output),
        })
    }
}

#[async_trait]
impl Refiner for OpenaiBackend {
    async fn refine(
        &self,
        original: &str,
        draft: &str,
        source_lang: &str,
        target_lang: &str,
        model: Option<&str>,
    ) -> CoreResult<RefinementResult> {
        let model = model.unwrap_or(&self.refinement_model);
        let user_content = json!({
            "source_lang": source_lang,
            "target_lang": target_lang,
            "original": original,
            "draft_translation": draft,
        })
        .to_string();

        let (content, token_input, token_output) =
            self.chat_completion(model, REFINEMENT_SYSTEM_PROMPT, &user_content, 0.3).await?;

        let refined_text = match serde_json::from_str::<Value>(&content) {
            Ok(parsed) => parsed["refined"].as_str().map(str::to_string).unwrap_or_else(|| content.clone()),
            Err(_) => content.trim().to_string(),
        };

        Ok(RefinementResult {
            text: refined_text,
            model: model.to_string(),
            token_input,
            token_output,
            cost_estimated: self.estimate_cost(token_input, token_output),
        })
    }
}
