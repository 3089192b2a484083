//! 按客户端限流（令牌桶）
//!
//! 每个客户端一个 governor 直连限流器：容量 `burst`，每 `refill_period` 补充
//! `refill_tokens` 个令牌。长时间不活跃的客户端由清理任务删除。

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use governor::clock::{Clock, DefaultClock, Reference};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::RateLimitConfig;

type DirectLimiter<C> =
    governor::RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// 限流参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitSettings {
    pub burst: u32,
    pub refill_tokens: u32,
    pub refill_period: Duration,
    pub inactivity: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self::from(&RateLimitConfig::default())
    }
}

impl From<&RateLimitConfig> for RateLimitSettings {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            burst: config.burst,
            refill_tokens: config.refill_tokens,
            refill_period: Duration::from_secs(config.refill_period_secs),
            inactivity: Duration::from_secs(config.inactivity_secs),
        }
    }
}

impl RateLimitSettings {
    /// 每 `refill_period / refill_tokens` 补充一个令牌，最多攒 `burst` 个
    pub fn quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.burst).unwrap_or(NonZeroU32::MIN);
        let per_token = self.refill_period / self.refill_tokens.max(1);
        Quota::with_period(per_token)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst)
    }
}

struct Visitor<C: Clock> {
    limiter: DirectLimiter<C>,
    last_seen: C::Instant,
}

/// 全局共享的限流器
///
/// 时钟可替换，测试里用 `FakeRelativeClock`。
#[derive(Clone)]
pub struct RateLimiter<C: Clock = DefaultClock> {
    visitors: Arc<DashMap<String, Visitor<C>>>,
    settings: RateLimitSettings,
    quota: Quota,
    clock: C,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self::with_clock(settings, DefaultClock::default())
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(RateLimitSettings::from(config))
    }

    /// 后台定时清理不活跃客户端
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    debug!(
                        "Rate limiter swept {} idle visitors, {} remain",
                        removed,
                        limiter.visitor_count()
                    );
                }
            }
        })
    }
}

impl<C: Clock + Clone> RateLimiter<C> {
    pub fn with_clock(settings: RateLimitSettings, clock: C) -> Self {
        Self {
            visitors: Arc::new(DashMap::new()),
            quota: settings.quota(),
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// 是否放行该客户端的本次请求
    pub fn allow(&self, client_id: &str) -> bool {
        let now = self.clock.now();

        // 持有分片锁完成整个判断，清理任务不会删掉正在使用的桶
        let mut visitor = self
            .visitors
            .entry(client_id.to_string())
            .or_insert_with(|| Visitor {
                limiter: governor::RateLimiter::direct_with_clock(self.quota, self.clock.clone()),
                last_seen: now,
            });
        visitor.last_seen = now;

        let admitted = visitor.limiter.check().is_ok();
        if !admitted {
            trace!("Rate limit hit for {}", client_id);
        }
        admitted
    }

    /// 删除超过 `inactivity` 未访问的客户端，返回删除数量
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let inactivity = self.settings.inactivity;
        let before = self.visitors.len();
        self.visitors
            .retain(|_, visitor| Duration::from(now.duration_since(visitor.last_seen)) <= inactivity);
        before.saturating_sub(self.visitors.len())
    }

    pub fn visitor_count(&self) -> usize {
        self.visitors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;

    fn limiter() -> (RateLimiter<FakeRelativeClock>, FakeRelativeClock) {
        let clock = FakeRelativeClock::default();
        (
            RateLimiter::with_clock(RateLimitSettings::default(), clock.clone()),
            clock,
        )
    }

    #[test]
    fn test_burst_then_reject() {
        let (limiter, _clock) = limiter();
        let results: Vec<bool> = (0..3).map(|_| limiter.allow("1.2.3.4")).collect();
        assert_eq!(results, vec![true, true, false]);
    }

    #[test]
    fn test_refill_after_interval() {
        let (limiter, clock) = limiter();
        assert!(limiter.allow("c"));
        assert!(limiter.allow("c"));
        assert!(!limiter.allow("c"));

        // 2 个令牌 / 30 秒 → 每 15 秒一个
        clock.advance(Duration::from_secs(10));
        assert!(!limiter.allow("c"));
        clock.advance(Duration::from_secs(6));
        assert!(limiter.allow("c"));
        assert!(!limiter.allow("c"));
    }

    #[test]
    fn test_refill_capped_at_burst() {
        let (limiter, clock) = limiter();
        assert!(limiter.allow("c"));

        clock.advance(Duration::from_secs(3600));
        let results: Vec<bool> = (0..3).map(|_| limiter.allow("c")).collect();
        assert_eq!(results, vec![true, true, false]);
    }

    #[test]
    fn test_clients_are_independent() {
        let (limiter, _clock) = limiter();
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
        assert_eq!(limiter.visitor_count(), 2);
    }

    #[test]
    fn test_sweep_idle_visitors() {
        let (limiter, clock) = limiter();
        limiter.allow("idle");
        limiter.allow("busy");
        clock.advance(Duration::from_secs(150));
        limiter.allow("busy");

        clock.advance(Duration::from_secs(31));
        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.visitor_count(), 1);

        // 被清理的客户端重新获得满桶
        assert!(limiter.allow("idle"));
        assert!(limiter.allow("idle"));
        assert!(!limiter.allow("idle"));
    }

    #[test]
    fn test_recently_seen_visitor_survives_sweep() {
        let (limiter, clock) = limiter();
        assert!(limiter.allow("c"));
        assert!(limiter.allow("c"));

        clock.advance(Duration::from_secs(180));
        assert_eq!(limiter.sweep(), 0);
        // 桶状态保留：180 秒内已补满，但不超过 burst
        let results: Vec<bool> = (0..3).map(|_| limiter.allow("c")).collect();
        assert_eq!(results, vec![true, true, false]);
    }

    #[test]
    fn test_quota_from_settings() {
        let quota = RateLimitSettings::default().quota();
        assert_eq!(quota.burst_size().get(), 2);
        assert_eq!(quota.replenish_interval(), Duration::from_secs(15));
    }

    #[test]
    fn test_concurrent_allow_respects_burst() {
        let limiter = RateLimiter::new(RateLimitSettings {
            burst: 10,
            refill_tokens: 1,
            refill_period: Duration::from_secs(3600),
            inactivity: Duration::from_secs(60),
        });

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..5).filter(|_| limiter.allow("shared")).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 10);
    }

    #[test]
    fn test_concurrent_sweep_never_grants_extra_tokens() {
        let clock = FakeRelativeClock::default();
        let limiter = RateLimiter::with_clock(
            RateLimitSettings {
                burst: 5,
                refill_tokens: 1,
                refill_period: Duration::from_secs(3600),
                inactivity: Duration::from_secs(60),
            },
            clock.clone(),
        );

        let sweeper = {
            let limiter = limiter.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    limiter.sweep();
                }
            })
        };
        let admitted = (0..50).filter(|_| limiter.allow("c")).count();
        sweeper.join().unwrap();

        // 时钟不动，访问者始终活跃，不会被清理重建
        assert_eq!(admitted, 5);
    }
}
