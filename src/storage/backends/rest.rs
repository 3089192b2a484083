//! PostgREST / Supabase 风格的 REST 存储
//!
//! - GET    {base}/rest/v1/{table}?col=eq.val   (Accept: application/vnd.pgrst.object+json)
//! - POST   {base}/rest/v1/{table}              (Prefer: return=representation)
//! - DELETE {base}/rest/v1/{table}?col=eq.val

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::errors::{Result, ShortlinkError};
use crate::storage::gateway::StoreGateway;
use crate::storage::models::Filter;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// 请求类型，决定 4xx 的含义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Get,
    Insert,
    Delete,
}

pub struct RestStore {
    base_url: String,
    api_key: String,
    client: Client,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShortlinkError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::new(
            &config.url,
            &config.api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, builder: RequestBuilder, op: Operation, target: &str) -> Result<Bytes> {
        let response = self.with_auth(builder).send().await.map_err(|e| {
            warn!("Store request {:?} {} failed: {}", op, target, e);
            ShortlinkError::store_unavailable(format!("Store request failed: {}", e))
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            ShortlinkError::store_unavailable(format!("Failed to read store response: {}", e))
        })?;

        if status.is_success() {
            debug!("Store {:?} {} -> {}", op, target, status);
            return Ok(body);
        }

        Err(classify_status(
            status,
            op,
            target,
            &String::from_utf8_lossy(&body),
        ))
    }
}

/// 非 2xx 响应映射到错误类型
pub(crate) fn classify_status(
    status: StatusCode,
    op: Operation,
    target: &str,
    body: &str,
) -> ShortlinkError {
    // 单对象查询在 0 行时返回 406
    if op == Operation::Get
        && (status == StatusCode::NOT_FOUND || status == StatusCode::NOT_ACCEPTABLE)
    {
        return ShortlinkError::not_found(format!("No record matches {}", target));
    }

    if status.is_server_error() {
        return ShortlinkError::store_unavailable(format!("HTTP {}: {}", status.as_u16(), body));
    }

    if status == StatusCode::CONFLICT {
        return ShortlinkError::store_rejected(format!("Duplicate record for {}: {}", target, body));
    }

    ShortlinkError::store_rejected(format!("HTTP {}: {}", status.as_u16(), body))
}

#[async_trait]
impl StoreGateway for RestStore {
    async fn get(&self, collection: &str, filter: &Filter) -> Result<Bytes> {
        let builder = self
            .client
            .get(self.table_url(collection))
            .query(&filter.to_query_pairs())
            .header("Accept", SINGLE_OBJECT);

        self.send(builder, Operation::Get, &format!("{}?{}", collection, filter))
            .await
    }

    async fn insert(&self, collection: &str, record: &serde_json::Value) -> Result<Bytes> {
        let builder = self
            .client
            .post(self.table_url(collection))
            .header("Prefer", "return=representation")
            .json(record);

        self.send(builder, Operation::Insert, collection).await
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<()> {
        // 没有条件的 DELETE 会清空整张表
        if filter.is_empty() {
            return Err(ShortlinkError::invalid_input(
                "Refusing to delete without a filter",
            ));
        }

        let builder = self
            .client
            .delete(self.table_url(collection))
            .query(&filter.to_query_pairs());

        self.send(builder, Operation::Delete, &format!("{}?{}", collection, filter))
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "rest"
    }
}
