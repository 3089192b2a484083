use async_trait::async_trait;
use bytes::Bytes;

use super::models::Filter;
use crate::errors::Result;

/// 持久化存储网关
///
/// 错误约定：
/// - 记录不存在 → `NotFound`
/// - 存储拒绝写入（重复键等）→ `StoreRejected`
/// - 网络 / 超时 / 5xx → `StoreUnavailable`
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// 按条件取单条记录，返回 JSON 对象
    async fn get(&self, collection: &str, filter: &Filter) -> Result<Bytes>;

    /// 插入一条记录，返回存储后的表示
    async fn insert(&self, collection: &str, record: &serde_json::Value) -> Result<Bytes>;

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<()>;

    fn backend_name(&self) -> &'static str;
}
