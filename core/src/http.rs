// Shared retry and circuit-breaker utilities used by every backend.
//
//   - Exponential backoff with +/-25% jitter (base 1s, max 30s, 3 retries)
//   - Retry on 429 (rate limit), 500, 502, 503, 504, 529
//   - Respects `Retry-After` header
//   - Circuit breaker: N consecutive failures -> fail fast for a cooldown

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use log::warn;

/// Default maximum number of retry attempts per request.
pub const MAX_RETRIES: u32 = 3;

const INITIAL_RETRY_DELAY_MS: u64 = 1_000;
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Check if an HTTP status code represents a transient/retryable error.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504 | 529)
}

/// Sleep with exponential backoff + jitter, honoring a server-supplied
/// Retry-After value when present. Returns the actual delay for logging.
pub async fn retry_delay(attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    let base_ms = INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt);
    let capped_ms = base_ms.min(MAX_RETRY_DELAY_MS);
    let delay_ms = if let Some(secs) = retry_after_secs {
        (secs.min(60) * 1000).max(capped_ms)
    } else {
        capped_ms
    };
    let jittered = apply_jitter(delay_ms);
    let delay = Duration::from_millis(jittered);
    tokio::time::sleep(delay).await;
    delay
}

fn apply_jitter(base_ms: u64) -> u64 {
    let jitter_range = (base_ms / 4) as i64;
    if jitter_range == 0 {
        return base_ms.max(100);
    }
    let offset = (rand_jitter() % (2 * jitter_range + 1)) - jitter_range;
    let result = base_ms as i64 + offset;
    result.max(100) as u64
}

fn rand_jitter() -> i64 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as i64
}

/// Parse a `Retry-After` header value (integer seconds only; HTTP-date
/// format is not implemented and falls back to computed backoff).
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    header_value.trim().parse::<u64>().ok()
}

/// Trips after N consecutive failures, then rejects requests for a cooldown
/// period before allowing a half-open probe through.
pub struct CircuitBreaker {
    consecutive_failures: AtomicU32,
    tripped_at: AtomicU64,
    threshold: u32,
    cooldown_secs: u64,
}

impl CircuitBreaker {
    pub const fn new(threshold: u32, cooldown_secs: u64) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            tripped_at: AtomicU64::new(0),
            threshold,
            cooldown_secs,
        }
    }

    /// Returns `Ok(())` if a request should be allowed through.
    pub fn check(&self) -> Result<(), String> {
        let failures = self.consecutive_failures.load(Ordering::Relaxed);
        if failures < self.threshold {
            return Ok(());
        }

        let tripped = self.tripped_at.load(Ordering::Relaxed);
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        if now - tripped < self.cooldown_secs {
            Err(format!(
                "circuit open: {} consecutive failures, cooling down for {}s",
                failures,
                self.cooldown_secs - (now - tripped)
            ))
        } else {
            Ok(())
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.tripped_at.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        let prev = self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        if prev + 1 >= self.threshold {
            let now = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            self.tripped_at.store(now, Ordering::Relaxed);
            warn!(
                "[circuit-breaker] tripped after {} consecutive failures, cooling down {}s",
                prev + 1,
                self.cooldown_secs
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(529));
        assert!(!is_retryable_status(200));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn parse_retry_after_valid() {
        assert_eq!(parse_retry_after("5"), Some(5));
        assert_eq!(parse_retry_after(" 30 "), Some(30));
        assert_eq!(parse_retry_after("not-a-number"), None);
    }

    #[test]
    fn jitter_stays_in_range() {
        for base in [100, 1000, 5000, 30_000] {
            let result = apply_jitter(base);
            let lower = (base as f64 * 0.7) as u64;
            let upper = (base as f64 * 1.3) as u64;
            assert!(result >= lower.max(100) && result <= upper);
        }
    }

    #[test]
    fn circuit_breaker_trips_and_recovers() {
        let cb = CircuitBreaker::new(3, 1);
        assert!(cb.check().is_ok());
        cb.record_failure();
        cb.record_failure();
        assert!(cb.check().is_ok());
        cb.record_failure();
        assert!(cb.check().is_err());
        cb.record_success();
        assert!(cb.check().is_ok());
    }

    #[test]
    fn circuit_breaker_resets_on_success() {
        let cb = CircuitBreaker::new(3, 60);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert!(cb.check().is_ok());
    }
}
