// Per-(date, provider) counter upserts and reads.

use rusqlite::{params, OptionalExtension};

use crate::error::CoreResult;
use crate::types::DailyUsageStats;

use super::Store;

/// Deltas supplied to [`UsageRepo::increment`]. `request_count` is always
/// bumped by exactly one per call; this only carries the other counters.
#[derive(Debug, Clone, Default)]
pub struct UsageDelta {
    pub char_count: i64,
    pub token_input: i64,
    pub token_output: i64,
    pub cost_estimated: f64,
}

pub struct UsageRepo<'a> {
    store: &'a Store,
}

impl<'a> UsageRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn get(&self, date: &str, provider: &str) -> CoreResult<Option<DailyUsageStats>> {
        let conn = self.store.conn.lock();
        let row = conn
            .query_row(
                "SELECT date, provider, request_count, char_count, token_input, token_output, cost_estimated
                 FROM daily_usage_stats WHERE date = ?1 AND provider = ?2",
                params![date, provider],
                row_to_stats,
            )
            .optional()?;
        Ok(row)
    }

    /// Atomic upsert: insert with request_count=1 if absent, else add the
    /// deltas and bump request_count by one. Single transaction (SQLite's
    /// `ON CONFLICT DO UPDATE` runs as one statement, already atomic).
    pub fn increment(&self, date: &str, provider: &str, delta: &UsageDelta) -> CoreResult<()> {
        let conn = self.store.conn.lock();
        conn.execute(
            "INSERT INTO daily_usage_stats (
                date, provider, request_count, char_count, token_input, token_output, cost_estimated
             ) VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6)
             ON CONFLICT(date, provider) DO UPDATE SET
                request_count = request_count + 1,
                char_count = char_count + excluded.char_count,
                token_input = token_input + excluded.token_input,
                token_output = token_output + excluded.token_output,
                cost_estimated = cost_estimated + excluded.cost_estimated",
            params![
                date,
                provider,
                delta.char_count,
                delta.token_input,
                delta.token_output,
                delta.cost_estimated,
            ],
        )?;
        Ok(())
    }

    pub fn list(&self, date: &str) -> CoreResult<Vec<DailyUsageStats>> {
        let conn = self.store.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT date, provider, request_count, char_count, token_input, token_output, cost_estimated
             FROM daily_usage_stats WHERE date = ?1",
        )?;
        let rows = stmt.query_map(params![date], row_to_stats)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Aggregated counters over the last `days` days, broken down by
    /// provider, plus each provider's current-calendar-month totals.
    pub fn dashboard(&self, days: u32) -> CoreResult<DashboardStats> {
        let conn = self.store.conn.lock();

        let total_requests: i64 = conn.query_row(
            "SELECT COALESCE(SUM(request_count), 0) FROM daily_usage_stats",
            [],
            |row| row.get(0),
        )?;
        let total_chars: i64 = conn.query_row(
            "SELECT COALESCE(SUM(char_count), 0) FROM daily_usage_stats",
            [],
            |row| row.get(0),
        )?;
        let total_cost: f64 = conn.query_row(
            "SELECT COALESCE(SUM(cost_estimated), 0.0) FROM daily_usage_stats",
            [],
            |row| row.get(0),
        )?;
        let cache_requests: i64 = conn.query_row(
            "SELECT COALESCE(SUM(request_count), 0) FROM daily_usage_stats WHERE provider = 'cache'",
            [],
            |row| row.get(0),
        )?;

        let cache_hit_rate = if total_requests > 0 {
            cache_requests as f64 / total_requests as f64
        } else {
            0.0
        };

        let mut stmt = conn.prepare(
            "SELECT date, SUM(request_count) as count FROM daily_usage_stats
             WHERE date >= date('now', ?1) GROUP BY date ORDER BY date ASC",
        )?;
        let window = format!("-{days} days");
        let daily_trend = stmt
            .query_map(params![window], |row| {
                Ok(DailyTrendPoint { date: row.get(0)?, count: row.get(1)? })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT provider, SUM(char_count), SUM(token_input), SUM(token_output), SUM(cost_estimated)
             FROM daily_usage_stats WHERE date >= date('now', 'start of month') GROUP BY provider",
        )?;
        let monthly: Vec<(String, i64, i64, i64, f64)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        const FREE_QUOTA_LIMIT: f64 = 500_000.0;
        let find = |name: &str| monthly.iter().find(|(p, ..)| p == name).cloned();

        let deepl = find("deepl").unwrap_or(("deepl".into(), 0, 0, 0, 0.0));
        let google = find("google").unwrap_or(("google".into(), 0, 0, 0, 0.0));
        let openai_trans = find("openai_trans").unwrap_or(("openai_trans".into(), 0, 0, 0, 0.0));
        let openai_refine = find("openai_refine").unwrap_or(("openai_refine".into(), 0, 0, 0, 0.0));

        Ok(DashboardStats {
            total_requests,
            total_chars,
            total_cost_usd: total_cost,
            cache_hit_rate,
            daily_trend,
            deepl_chars_month: deepl.1,
            google_chars_month: google.1,
            openai_tokens_input_month: openai_trans.2 + openai_refine.2,
            openai_tokens_output_month: openai_trans.3 + openai_refine.3,
            openai_cost_month: openai_trans.4 + openai_refine.4,
            deepl_quota_percent: (deepl.1 as f64 / FREE_QUOTA_LIMIT) * 100.0,
            google_quota_percent: (google.1 as f64 / FREE_QUOTA_LIMIT) * 100.0,
        })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DailyTrendPoint {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DashboardStats {
    pub total_requests: i64,
    pub total_chars: i64,
    pub total_cost_usd: f64,
    pub cache_hit_rate: f64,
    pub daily_trend: Vec<DailyTrendPoint>,
    pub deepl_chars_month: i64,
    pub google_chars_month: i64,
    pub openai_tokens_input_month: i64,
    pub openai_tokens_output_month: i64,
    pub openai_cost_month: f64,
    pub deepl_quota_percent: f64,
    pub google_quota_percent: f64,
}

fn row_to_stats(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyUsageStats> {
    Ok(DailyUsageStats {
        date: row.get(0)?,
        provider: row.get(1)?,
        request_count: row.get(2)?,
        char_count: row.get(3)?,
        token_input: row.get(4)?,
        token_output: row.get(5)?,
        cost_estimated: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_none_when_absent() {
        let store = Store::open_in_memory().unwrap();
        let repo = UsageRepo::new(&store);
        assert!(repo.get("2026-01-01", "deepl").unwrap().is_none());
    }

    #[test]
    fn increment_then_get_matches_deltas() {
        let store = Store::open_in_memory().unwrap();
        let repo = UsageRepo::new(&store);
        repo.increment("2026-01-01", "google", &UsageDelta { char_count: 100, cost_estimated: 0.002, ..Default::default() }).unwrap();

        let row = repo.get("2026-01-01", "google").unwrap().unwrap();
        assert_eq!(row.request_count, 1);
        assert_eq!(row.char_count, 100);
        assert!((row.cost_estimated - 0.002).abs() < 1e-9);
    }

    #[test]
    fn repeated_increments_accumulate_request_count() {
        let store = Store::open_in_memory().unwrap();
        let repo = UsageRepo::new(&store);
        for _ in 0..5 {
            repo.increment("2026-01-01", "deepl", &UsageDelta { char_count: 10, ..Default::default() }).unwrap();
        }

        let row = repo.get("2026-01-01", "deepl").unwrap().unwrap();
        assert_eq!(row.request_count, 5);
        assert_eq!(row.char_count, 50);
    }

    #[test]
    fn list_returns_all_providers_for_a_date() {
        let store = Store::open_in_memory().unwrap();
        let repo = UsageRepo::new(&store);
        repo.increment("2026-01-01", "deepl", &UsageDelta::default()).unwrap();
        repo.increment("2026-01-01", "google", &UsageDelta::default()).unwrap();
        repo.increment("2026-01-02", "google", &UsageDelta::default()).unwrap();

        let rows = repo.list("2026-01-01").unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn dashboard_computes_cache_hit_rate() {
        let store = Store::open_in_memory().unwrap();
        let repo = UsageRepo::new(&store);
        repo.increment("2026-01-01", "cache", &UsageDelta::default()).unwrap();
        repo.increment("2026-01-01", "cache", &UsageDelta::default()).unwrap();
        repo.increment("2026-01-01", "deepl", &UsageDelta::default()).unwrap();

        let dash = repo.dashboard(30).unwrap();
        assert_eq!(dash.total_requests, 3);
        assert!((dash.cache_hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }
}
