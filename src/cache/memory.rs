use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::ops::compute::Op;
use moka::policy::Expiry;
use moka::sync::Cache;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::traits::{CacheResult, ObjectCache};

/// 单条缓存的最长存活时间，超过的 TTL 会被截断
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
struct CachedUrl {
    url: String,
    ttl: Duration,
}

/// 过期时间从写入（或覆盖）时算起，读取不续期
struct WriteExpiry;

impl Expiry<String, CachedUrl> for WriteExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedUrl,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedUrl,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// 进程内 TTL 缓存（moka）
///
/// 没有容量上限；过期条目不会被返回，后台 `sweep` 负责回收。
#[derive(Clone)]
pub struct TtlCache {
    inner: Cache<String, CachedUrl>,
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TtlCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder().expire_after(WriteExpiry).build(),
        }
    }

    fn entry(value: String, ttl: Duration) -> CachedUrl {
        CachedUrl {
            url: value,
            ttl: ttl.min(Duration::from_secs(MAX_TTL_SECS)),
        }
    }

    /// 回收过期条目
    pub fn sweep(&self) {
        self.inner.run_pending_tasks();
    }

    /// 未过期的条目数
    pub fn len(&self) -> usize {
        self.inner.run_pending_tasks();
        self.inner.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 后台定时清理
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 第一次 tick 立即返回
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep();
                debug!("Cache sweep done, {} entries", cache.inner.entry_count());
            }
        })
    }
}

#[async_trait]
impl ObjectCache for TtlCache {
    async fn get(&self, key: &str) -> CacheResult {
        match self.inner.get(key) {
            Some(entry) => CacheResult::Found(entry.url),
            None => CacheResult::Miss,
        }
    }

    async fn set(&self, key: String, value: String, ttl: Duration) {
        self.inner.insert(key, Self::entry(value, ttl));
    }

    async fn set_unless_conflict(
        &self,
        key: String,
        value: String,
        ttl: Duration,
    ) -> Option<String> {
        let mut conflict = None;
        self.inner.entry(key).and_compute_with(|current| match current {
            Some(current) if current.value().url != value => {
                conflict = Some(current.into_value().url);
                Op::Nop
            }
            // 同一个 URL 刷新过期时间
            _ => Op::Put(Self::entry(value, ttl)),
        });
        conflict
    }

    async fn delete(&self, key: &str) {
        self.inner.invalidate(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(600);
    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_get_before_and_after_expiry() {
        let cache = TtlCache::new();
        cache.set("1".into(), "https://a".into(), SHORT).await;

        assert_eq!(cache.get("1").await, CacheResult::Found("https://a".into()));
        tokio::time::sleep(SHORT * 2).await;
        assert_eq!(cache.get("1").await, CacheResult::Miss);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_read_does_not_extend_ttl() {
        let cache = TtlCache::new();
        cache
            .set("1".into(), "https://a".into(), Duration::from_millis(100))
            .await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get("1").await, CacheResult::Found("https://a".into()));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get("1").await, CacheResult::Miss);
    }

    #[tokio::test]
    async fn test_sweep_reclaims_expired() {
        let cache = TtlCache::new();
        cache.set("old".into(), "https://old".into(), SHORT).await;
        cache.set("new".into(), "https://new".into(), TTL).await;

        tokio::time::sleep(SHORT * 2).await;
        cache.sweep();
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get("new").await,
            CacheResult::Found("https://new".into())
        );
    }

    #[tokio::test]
    async fn test_set_unless_conflict() {
        let cache = TtlCache::new();

        assert_eq!(
            cache
                .set_unless_conflict("1".into(), "https://a".into(), SHORT)
                .await,
            None
        );
        // 同一个 URL：允许，刷新过期时间
        assert_eq!(
            cache
                .set_unless_conflict("1".into(), "https://a".into(), SHORT)
                .await,
            None
        );
        // 不同 URL：拒绝
        assert_eq!(
            cache
                .set_unless_conflict("1".into(), "https://b".into(), TTL)
                .await,
            Some("https://a".into())
        );
        assert_eq!(cache.get("1").await, CacheResult::Found("https://a".into()));

        // 旧值过期后可以被替换
        tokio::time::sleep(SHORT * 2).await;
        assert_eq!(
            cache
                .set_unless_conflict("1".into(), "https://b".into(), TTL)
                .await,
            None
        );
        assert_eq!(cache.get("1").await, CacheResult::Found("https://b".into()));
    }

    #[tokio::test]
    async fn test_huge_ttl_is_capped() {
        let cache = TtlCache::new();
        cache
            .set("1".into(), "https://a".into(), Duration::from_secs(u64::MAX))
            .await;
        assert_eq!(cache.get("1").await, CacheResult::Found("https://a".into()));
        assert_eq!(
            cache
                .set_unless_conflict("2".into(), "https://b".into(), Duration::MAX)
                .await,
            None
        );
        assert_eq!(cache.get("2").await, CacheResult::Found("https://b".into()));
    }

    #[tokio::test]
    async fn test_trait_roundtrip_and_delete() {
        let cache = TtlCache::new();
        cache.set("42".into(), "https://x".into(), TTL).await;
        assert_eq!(cache.get("42").await, CacheResult::Found("https://x".into()));
        cache.delete("42").await;
        assert_eq!(cache.get("42").await, CacheResult::Miss);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_spawned_sweeper_runs() {
        let cache = TtlCache::new();
        cache.set("k".into(), "https://k".into(), Duration::from_millis(10)).await;

        let handle = cache.spawn_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.inner.entry_count(), 0);
        handle.abort();
    }
}
