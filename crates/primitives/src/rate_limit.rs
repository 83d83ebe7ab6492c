//! Sliding-window rate limiting, backing the `rate-limit` middleware layer.

use claudebench_concurrency::AtomicExecutor;
use claudebench_core::config::RateLimitConfig;
use claudebench_core::key::Key;
use claudebench_core::{Error, Result};
use claudebench_storage::StoreOp;

/// Read/write facade over `cb:ratelimit:<event>:<actor>`.
pub struct RateLimiter {
    executor: AtomicExecutor,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Build a rate limiter over a shared executor with the given defaults.
    pub fn new(executor: AtomicExecutor, config: RateLimitConfig) -> Self {
        Self { executor, config }
    }

    /// Prune the window and check whether another call may be admitted,
    /// without recording this one — recording is deferred to
    /// [`Self::record`] once the outcome is known, honoring
    /// `skip_successful_requests`/`skip_failed_requests`.
    pub fn check(&self, event: &str, actor: &str) -> Result<()> {
        let key = Key::rate_limit(event, actor).as_str().to_string();
        let limit = self.config.limit;
        let window_ms = self.config.window_ms;
        self.executor.execute("RATE_LIMIT_CHECK", move |store, now| {
            let window_start = now - window_ms as i64;
            let stale = store.zset_members_below(&key, window_start);
            let ops: Vec<StoreOp> = stale
                .into_iter()
                .map(|member| StoreOp::ZRem { key: key.clone(), member })
                .collect();
            let remaining_after_prune = store.zset_card(&key).saturating_sub(ops.len());
            if remaining_after_prune >= limit as usize {
                let oldest = store
                    .zset_range(&key, 0, 1)
                    .first()
                    .map(|(_, score)| *score)
                    .unwrap_or(now);
                let retry_after_ms = (oldest + window_ms as i64 - now).max(0) as u64;
                let remaining = limit.saturating_sub(remaining_after_prune as u32);
                return Err(Error::RateLimitExceeded {
                    limit,
                    window_ms,
                    retry_after_ms,
                    remaining,
                });
            }
            Ok(((), ops))
        })
    }

    /// Record an admitted call's outcome. Adds a timestamped window entry
    /// unless the descriptor's config opts out of counting it.
    pub fn record(&self, event: &str, actor: &str, success: bool) -> Result<()> {
        if success && self.config.skip_successful_requests {
            return Ok(());
        }
        if !success && self.config.skip_failed_requests {
            return Ok(());
        }
        let key = Key::rate_limit(event, actor).as_str().to_string();
        self.executor.execute("RATE_LIMIT_RECORD", move |store, now| {
            let seq = store.next_zset_seq();
            let ops = vec![StoreOp::ZAdd {
                key,
                member: format!("{now}-{seq}"),
                score: now,
                seq,
            }];
            Ok(((), ops))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claudebench_core::clock::TestClock;
    use std::sync::Arc;

    fn limiter(limit: u32, window_ms: u64) -> (RateLimiter, Arc<TestClock>) {
        let clock = Arc::new(TestClock::new(0));
        let executor = AtomicExecutor::in_memory(clock.clone());
        let config = RateLimitConfig {
            limit,
            window_ms,
            skip_successful_requests: false,
            skip_failed_requests: false,
        };
        (RateLimiter::new(executor, config), clock)
    }

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let (rl, _clock) = limiter(3, 1_000);
        for _ in 0..3 {
            rl.check("task.create", "actor-1").unwrap();
            rl.record("task.create", "actor-1", true).unwrap();
        }
        let err = rl.check("task.create", "actor-1").unwrap_err();
        assert!(matches!(err, Error::RateLimitExceeded { .. }));
    }

    #[test]
    fn window_slides_and_releases_capacity() {
        let (rl, clock) = limiter(2, 1_000);
        rl.check("e", "a").unwrap();
        rl.record("e", "a", true).unwrap();
        rl.check("e", "a").unwrap();
        rl.record("e", "a", true).unwrap();
        assert!(rl.check("e", "a").is_err());

        clock.advance(1_001);
        rl.check("e", "a").unwrap();
    }

    #[test]
    fn skip_successful_requests_does_not_count_toward_limit() {
        let clock = Arc::new(TestClock::new(0));
        let executor = AtomicExecutor::in_memory(clock);
        let config = RateLimitConfig {
            limit: 1,
            window_ms: 1_000,
            skip_successful_requests: true,
            skip_failed_requests: false,
        };
        let rl = RateLimiter::new(executor, config);
        rl.check("e", "a").unwrap();
        rl.record("e", "a", true).unwrap();
        rl.check("e", "a").unwrap();
    }

    #[test]
    fn separate_actors_have_independent_windows() {
        let (rl, _clock) = limiter(1, 1_000);
        rl.check("e", "a").unwrap();
        rl.record("e", "a", true).unwrap();
        rl.check("e", "b").unwrap();
    }
}
