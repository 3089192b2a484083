use std::time::Duration;

use async_trait::async_trait;

/// 缓存查询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheResult {
    /// 命中，值为原始 URL
    Found(String),
    /// 未命中或已过期
    Miss,
}

/// 短码 → 原始 URL 的缓存
///
/// 缓存可以随时丢失，不影响正确性；过期时间从写入时算起，读取不续期。
#[async_trait]
pub trait ObjectCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult;

    /// 写入（覆盖已有值）
    async fn set(&self, key: String, value: String, ttl: Duration);

    /// 写入，但不覆盖指向其它 URL 的未过期条目
    ///
    /// 返回 `Some(existing)` 表示发生冲突且未写入。
    async fn set_unless_conflict(
        &self,
        key: String,
        value: String,
        ttl: Duration,
    ) -> Option<String>;

    async fn delete(&self, key: &str);
}
