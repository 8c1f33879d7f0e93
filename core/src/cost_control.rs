// In-memory quota flags + budget predicates computed from UsageRepo.
//
// Two orthogonal signals: external quota is authoritative and coarse (set by
// a provider error code), internal budget is a policy guardrail set by the
// operator. Either alone can disable a tier without affecting the others.

use std::collections::HashSet;

use chrono::Local;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::CoreResult;
use crate::store::usage_repo::{UsageDelta, UsageRepo};
use crate::store::Store;
use crate::types::provider_names;

pub struct CostController {
    quota_exceeded: Mutex<HashSet<String>>,
    daily_budget_google: f64,
    daily_budget_openai: f64,
    google_price_per_million_chars: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub limit: f64,
    pub exceeded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: String,
    pub providers: Vec<crate::types::DailyUsageStats>,
    pub total_cost: f64,
    pub total_requests: i64,
    pub google_budget: BudgetStatus,
    pub openai_budget: BudgetStatus,
}

impl CostController {
    pub fn new(daily_budget_google: f64, daily_budget_openai: f64, google_price_per_million_chars: f64) -> Self {
        Self {
            quota_exceeded: Mutex::new(HashSet::new()),
            daily_budget_google,
            daily_budget_openai,
            google_price_per_million_chars,
        }
    }

    pub fn set_quota_exceeded(&self, provider: &str) {
        self.quota_exceeded.lock().insert(provider.to_lowercase());
    }

    pub fn is_quota_exceeded(&self, provider: &str) -> bool {
        self.quota_exceeded.lock().contains(&provider.to_lowercase())
    }

    pub fn reset_quota_exceeded(&self, provider: &str) {
        self.quota_exceeded.lock().remove(&provider.to_lowercase());
    }

    /// `provider` is one of the usage-ledger names (`google`, `openai_trans`,
    /// `openai_refine`); the specialized MT tier (`deepl`) has no budget
    /// check — quota is external-only for it.
    pub fn is_budget_exceeded(&self, store: &Store, provider: &str) -> CoreResult<bool> {
        let provider = provider.to_lowercase();
        let today = today_str();
        let repo = UsageRepo::new(store);
        let usage = match repo.get(&today, &provider)? {
            Some(u) => u,
            None => return Ok(false),
        };

        if provider == provider_names::GOOGLE {
            let estimated_cost = (usage.char_count as f64 / 1_000_000.0) * self.google_price_per_million_chars;
            Ok(estimated_cost >= self.daily_budget_google)
        } else if provider.starts_with("openai") {
            Ok(usage.cost_estimated >= self.daily_budget_openai)
        } else {
            Ok(false)
        }
    }

    /// Sums `openai_trans.cost_estimated + openai_refine.cost_estimated` for
    /// today and compares against the combined LLM budget.
    pub fn is_llm_budget_exceeded(&self, store: &Store) -> CoreResult<bool> {
        Ok(self.total_llm_cost(store)? >= self.daily_budget_openai)
    }

    pub fn total_llm_cost(&self, store: &Store) -> CoreResult<f64> {
        let today = today_str();
        let repo = UsageRepo::new(store);
        let mut total = 0.0;
        for provider in [provider_names::OPENAI_TRANS, provider_names::OPENAI_REFINE] {
            if let Some(usage) = repo.get(&today, provider)? {
                total += usage.cost_estimated;
            }
        }
        Ok(total)
    }

    pub fn record_usage(
        &self,
        store: &Store,
        provider: &str,
        char_count: i64,
        token_input: i64,
        token_output: i64,
        cost_estimated: f64,
    ) -> CoreResult<()> {
        let repo = UsageRepo::new(store);
        repo.increment(
            &today_str(),
            &provider.to_lowercase(),
            &UsageDelta { char_count, token_input, token_output, cost_estimated },
        )
    }

    pub fn daily_summary(&self, store: &Store, date: Option<&str>) -> CoreResult<DailySummary> {
        let date = date.map(str::to_string).unwrap_or_else(today_str);
        let repo = UsageRepo::new(store);
        let providers = repo.list(&date)?;

        let total_cost = providers.iter().map(|p| p.cost_estimated).sum();
        let total_requests = providers.iter().map(|p| p.request_count).sum();

        Ok(DailySummary {
            date,
            providers,
            total_cost,
            total_requests,
            google_budget: BudgetStatus {
                limit: self.daily_budget_google,
                exceeded: self.is_budget_exceeded(store, provider_names::GOOGLE)?,
            },
            openai_budget: BudgetStatus {
                limit: self.daily_budget_openai,
                exceeded: self.is_llm_budget_exceeded(store)?,
            },
        })
    }
}

fn today_str() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> CostController {
        CostController::new(10.0, 5.0, 20.0)
    }

    #[test]
    fn quota_not_exceeded_initially() {
        let c = controller();
        assert!(!c.is_quota_exceeded("deepl"));
        assert!(!c.is_quota_exceeded("google"));
    }

    #[test]
    fn set_quota_exceeded_is_reflected() {
        let c = controller();
        c.set_quota_exceeded("deepl");
        assert!(c.is_quota_exceeded("deepl"));
        assert!(!c.is_quota_exceeded("google"));
    }

    #[test]
    fn reset_quota_exceeded_clears_flag() {
        let c = controller();
        c.set_quota_exceeded("deepl");
        c.reset_quota_exceeded("deepl");
        assert!(!c.is_quota_exceeded("deepl"));
    }

    #[test]
    fn quota_check_is_case_insensitive() {
        let c = controller();
        c.set_quota_exceeded("DeepL");
        assert!(c.is_quota_exceeded("deepl"));
        assert!(c.is_quota_exceeded("DEEPL"));
    }

    #[test]
    fn budget_not_exceeded_with_no_usage() {
        let store = Store::open_in_memory().unwrap();
        let c = controller();
        assert!(!c.is_budget_exceeded(&store, "google").unwrap());
    }

    #[test]
    fn google_budget_exceeded_over_limit() {
        let store = Store::open_in_memory().unwrap();
        let c = controller();
        // 600,000 chars = $12 at $20/1M, over the $10 default budget.
        c.record_usage(&store, "google", 600_000, 0, 0, 0.0).unwrap();
        assert!(c.is_budget_exceeded(&store, "google").unwrap());
    }

    #[test]
    fn google_budget_not_exceeded_under_limit() {
        let store = Store::open_in_memory().unwrap();
        let c = controller();
        // 400,000 chars = $8 at $20/1M, under the $10 default budget.
        c.record_usage(&store, "google", 400_000, 0, 0, 0.0).unwrap();
        assert!(!c.is_budget_exceeded(&store, "google").unwrap());
    }

    #[test]
    fn openai_budget_exceeded_combines_trans_and_refine() {
        let store = Store::open_in_memory().unwrap();
        let c = controller();
        c.record_usage(&store, "openai_trans", 0, 1_000_000, 0, 3.0).unwrap();
        c.record_usage(&store, "openai_refine", 0, 500_000, 0, 2.5).unwrap();
        assert!(c.is_llm_budget_exceeded(&store).unwrap());
    }

    #[test]
    fn record_usage_increments_exactly_once() {
        let store = Store::open_in_memory().unwrap();
        let c = controller();
        c.record_usage(&store, "deepl", 5, 0, 0, 0.0).unwrap();
        let repo = UsageRepo::new(&store);
        let row = repo.get(&today_str(), "deepl").unwrap().unwrap();
        assert_eq!(row.request_count, 1);
        assert_eq!(row.char_count, 5);
    }
}
