// Exchange-rate and provider-pricing cache with staleness-triggered refresh.
//
// The actual network fetches (public FX API, provider pricing pages) are an
// external collaborator's concern — this module owns the staleness check,
// retry-with-backoff contract, persistence, and synchronous fallback
// accessors behind the `DataSource` trait so the whole thing is testable
// without real network access. `DefaultDataSource` always returns the
// hardcoded fallback values a live scraper would otherwise degrade to.

use async_trait::async_trait;
use chrono::Utc;
use log::{error, info, warn};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json;

use crate::error::CoreResult;
use crate::store::Store;

const RETRIES: u32 = 5;
const INITIAL_BACKOFF_SECS: f64 = 1.0;
const BACKOFF_FACTOR: f64 = 2.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRateData {
    pub rate: f64,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingData {
    pub deepl_free_limit: i64,
    pub google_free_limit: i64,
    pub google_price_per_million_chars: f64,
    pub openai_price_input: f64,
    pub openai_price_output: f64,
    pub updated_at: String,
}

impl Default for PricingData {
    fn default() -> Self {
        Self {
            deepl_free_limit: 500_000,
            google_free_limit: 500_000,
            google_price_per_million_chars: 20.0,
            openai_price_input: 0.15,
            openai_price_output: 0.60,
            updated_at: String::new(),
        }
    }
}

/// Abstracts the actual network fetch so the staleness/retry/persist
/// contract can be exercised deterministically in tests.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Returns `None` after exhausting retries; never errors.
    async fn fetch_exchange_rate(&self) -> Option<f64>;
    async fn fetch_deepl_free_limit(&self) -> i64;
    async fn fetch_google_pricing(&self) -> (i64, f64);
    async fn fetch_openai_pricing(&self) -> (f64, f64);
}

/// Falls through to hardcoded defaults without performing any I/O.
pub struct DefaultDataSource;

#[async_trait]
impl DataSource for DefaultDataSource {
    async fn fetch_exchange_rate(&self) -> Option<f64> {
        warn!("[external-data] using fallback exchange rate: 32.5");
        Some(32.5)
    }

    async fn fetch_deepl_free_limit(&self) -> i64 {
        500_000
    }

    async fn fetch_google_pricing(&self) -> (i64, f64) {
        (500_000, 20.0)
    }

    async fn fetch_openai_pricing(&self) -> (f64, f64) {
        (0.15, 0.60)
    }
}

/// Retries an async fallible fetch with exponential backoff, returning
/// `None` once `retries` attempts have failed. Callers supply a closure
/// returning `Option` rather than `Result` since a failed fetch here is
/// expected and non-fatal, not an error condition.
pub async fn fetch_with_retry<F, Fut, T>(mut attempt_fn: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    let mut delay = INITIAL_BACKOFF_SECS;
    for attempt in 0..RETRIES {
        if let Some(value) = attempt_fn().await {
            return Some(value);
        }
        warn!("[external-data] fetch attempt {}/{} failed", attempt + 1, RETRIES);
        if attempt + 1 < RETRIES {
            tokio::time::sleep(std::time::Duration::from_secs_f64(delay)).await;
            delay *= BACKOFF_FACTOR;
        }
    }
    error!("[external-data] failed after {RETRIES} attempts");
    None
}

pub struct ExternalDataService<'a> {
    store: &'a Store,
}

impl<'a> ExternalDataService<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn ensure_table_exists(&self) -> CoreResult<()> {
        let conn = self.store.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS external_data (
                category TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )?;
        Ok(())
    }

    fn load_raw(&self, category: &str) -> CoreResult<Option<(String, String)>> {
        let conn = self.store.conn.lock();
        let row = conn
            .query_row(
                "SELECT data, updated_at FROM external_data WHERE category = ?1",
                params![category],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    pub fn load_exchange_rate(&self) -> CoreResult<Option<ExchangeRateData>> {
        let Some((data, updated_at)) = self.load_raw("exchange_rate")? else {
            return Ok(None);
        };
        let parsed: serde_json::Value = match serde_json::from_str(&data) {
            Ok(v) => v,
            Err(e) => {
                error!("[external-data] failed to parse exchange rate data: {e}");
                return Ok(None);
            }
        };
        let rate = parsed["USD_TWD"].as_f64().unwrap_or(32.0);
        Ok(Some(ExchangeRateData { rate, updated_at }))
    }

    pub fn load_pricing(&self) -> CoreResult<Option<PricingData>> {
        let Some((data, updated_at)) = self.load_raw("pricing")? else {
            return Ok(None);
        };
        let parsed: serde_json::Value = match serde_json::from_str(&data) {
            Ok(v) => v,
            Err(e) => {
                error!("[external-data] failed to parse pricing data: {e}");
                return Ok(None);
            }
        };
        Ok(Some(PricingData {
            deepl_free_limit: parsed["deepl_free_limit"].as_i64().unwrap_or(500_000),
            google_free_limit: parsed["google_free_limit"].as_i64().unwrap_or(500_000),
            google_price_per_million_chars: parsed["google_price_per_million_chars"].as_f64().unwrap_or(20.0),
            openai_price_input: parsed["openai_price_input"].as_f64().unwrap_or(0.15),
            openai_price_output: parsed["openai_price_output"].as_f64().unwrap_or(0.60),
            updated_at,
        }))
    }

    fn save(&self, category: &str, data: &serde_json::Value) -> CoreResult<()> {
        let conn = self.store.conn.lock();
        conn.execute(
            "INSERT INTO external_data (category, data, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(category) DO UPDATE SET
                data = excluded.data,
                updated_at = CURRENT_TIMESTAMP",
            params![category, data.to_string()],
        )?;
        Ok(())
    }

    /// Loads from the database and, if the cached row is missing or wasn't
    /// touched today, refreshes via `source`.
    pub async fn initialize(&self, source: &dyn DataSource) -> CoreResult<()> {
        self.ensure_table_exists()?;

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let rate_stale = match self.load_exchange_rate()? {
            Some(cached) => !cached.updated_at.starts_with(&today),
            None => true,
        };

        if rate_stale {
            info!("[external-data] exchange rate is outdated or missing, refreshing");
            self.refresh_exchange_rate(source).await?;
        }

        let pricing_stale = match self.load_pricing()? {
            Some(cached) => !cached.updated_at.starts_with(&today),
            None => true,
        };

        if pricing_stale {
            info!("[external-data] pricing is outdated or missing, refreshing");
            self.refresh_pricing(source).await?;
        }

        Ok(())
    }

    pub async fn refresh_exchange_rate(&self, source: &dyn DataSource) -> CoreResult<()> {
        if let Some(rate) = source.fetch_exchange_rate().await {
            self.save("exchange_rate", &serde_json::json!({ "USD_TWD": rate }))?;
            info!("[external-data] updated USD/TWD exchange rate: {rate}");
        }
        Ok(())
    }

    pub async fn refresh_pricing(&self, source: &dyn DataSource) -> CoreResult<()> {
        let deepl_free_limit = source.fetch_deepl_free_limit().await;
        let (google_free_limit, google_price_per_million_chars) = source.fetch_google_pricing().await;
        let (openai_price_input, openai_price_output) = source.fetch_openai_pricing().await;

        self.save(
            "pricing",
            &serde_json::json!({
                "deepl_free_limit": deepl_free_limit,
                "google_free_limit": google_free_limit,
                "google_price_per_million_chars": google_price_per_million_chars,
                "openai_price_input": openai_price_input,
                "openai_price_output": openai_price_output,
            }),
        )?;
        info!("[external-data] updated pricing data");
        Ok(())
    }

    /// Synchronous fallback accessor: defaults to 32.0 when nothing is cached.
    pub fn exchange_rate(&self) -> f64 {
        self.load_exchange_rate().ok().flatten().map(|d| d.rate).unwrap_or(32.0)
    }

    pub fn pricing(&self) -> PricingData {
        self.load_pricing().ok().flatten().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct FlakyThenOk {
        attempts: AtomicU32,
        succeed_at: u32,
    }

    #[async_trait]
    impl DataSource for FlakyThenOk {
        async fn fetch_exchange_rate(&self) -> Option<f64> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n + 1 >= self.succeed_at {
                Some(31.2)
            } else {
                None
            }
        }

        async fn fetch_deepl_free_limit(&self) -> i64 {
            500_000
        }

        async fn fetch_google_pricing(&self) -> (i64, f64) {
            (500_000, 20.0)
        }

        async fn fetch_openai_pricing(&self) -> (f64, f64) {
            (0.15, 0.60)
        }
    }

    #[tokio::test]
    async fn exchange_rate_defaults_to_32_when_nothing_cached() {
        let store = Store::open_in_memory().unwrap();
        let service = ExternalDataService::new(&store);
        service.ensure_table_exists().unwrap();
        assert_eq!(service.exchange_rate(), 32.0);
    }

    #[tokio::test]
    async fn pricing_defaults_match_hardcoded_fallback() {
        let store = Store::open_in_memory().unwrap();
        let service = ExternalDataService::new(&store);
        service.ensure_table_exists().unwrap();
        let pricing = service.pricing();
        assert_eq!(pricing.google_price_per_million_chars, 20.0);
        assert_eq!(pricing.openai_price_input, 0.15);
    }

    #[tokio::test]
    async fn refresh_exchange_rate_persists_and_reads_back() {
        let store = Store::open_in_memory().unwrap();
        let service = ExternalDataService::new(&store);
        service.ensure_table_exists().unwrap();

        service.refresh_exchange_rate(&DefaultDataSource).await.unwrap();
        assert_eq!(service.exchange_rate(), 32.5);
    }

    #[tokio::test]
    async fn initialize_refreshes_when_missing() {
        let store = Store::open_in_memory().unwrap();
        let service = ExternalDataService::new(&store);
        service.initialize(&DefaultDataSource).await.unwrap();

        assert_eq!(service.exchange_rate(), 32.5);
        assert_eq!(service.pricing().google_price_per_million_chars, 20.0);
    }

    #[tokio::test]
    async fn fetch_with_retry_recovers_after_transient_failures() {
        let source = FlakyThenOk { attempts: AtomicU32::new(0), succeed_at: 3 };
        let result = fetch_with_retry(|| source.fetch_exchange_rate()).await;
        assert_eq!(result, Some(31.2));
    }

    #[tokio::test]
    async fn fetch_with_retry_gives_up_after_exhausting_attempts() {
        let source = FlakyThenOk { attempts: AtomicU32::new(0), succeed_at: 100 };
        let result = fetch_with_retry(|| source.fetch_exchange_rate()).await;
        assert_eq!(result, None);
    }
}
