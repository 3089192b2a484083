//! 表结构初始化
//!
//! 通过存储的 RPC 接口检查并创建表，需要在数据库中预先定义：
//! - `table_exists(tbl text) returns boolean`
//! - `execute_sql(sql text)`

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::info;

use super::models::{LOG_ACTION_TABLE, LOG_ERROR_TABLE, URLS_TABLE};
use crate::config::StoreConfig;
use crate::errors::{Result, ShortlinkError};

/// (表名, 建表语句)
pub const SCHEMA: &[(&str, &str)] = &[
    (
        URLS_TABLE,
        "create table if not exists urls (
            id bigserial primary key,
            hash text not null unique,
            original_url text not null,
            owner_id bigint not null default 0,
            created_at timestamptz not null default now()
        );",
    ),
    (
        LOG_ACTION_TABLE,
        "create table if not exists log_action (
            id bigserial primary key,
            telegram_id bigint not null,
            action text not null,
            created_at timestamptz not null default now()
        );",
    ),
    (
        LOG_ERROR_TABLE,
        "create table if not exists log_error (
            id bigserial primary key,
            telegram_id bigint not null,
            error text not null,
            error_code text not null,
            created_at timestamptz not null default now()
        );",
    ),
];

pub struct SchemaMigrator {
    base_url: String,
    api_key: String,
    client: Client,
}

impl SchemaMigrator {
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

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    async fn call_rpc(&self, function: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.rpc_url(function))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response.text().await.unwrap_or_default();
        let message = format!("RPC {} failed (status {}): {}", function, status.as_u16(), detail);
        if status.is_server_error() {
            Err(ShortlinkError::store_unavailable(message))
        } else {
            Err(ShortlinkError::store_rejected(message))
        }
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let response = self.call_rpc("table_exists", json!({ "tbl": table })).await?;
        let exists = response.json::<bool>().await.map_err(|e| {
            ShortlinkError::serialization(format!("Unexpected table_exists response: {}", e))
        })?;
        Ok(exists)
    }

    pub async fn create_table(&self, table: &str, ddl: &str) -> Result<()> {
        tracing::debug!("Creating table {}", table);
        self.call_rpc("execute_sql", json!({ "sql": ddl })).await?;
        Ok(())
    }

    /// 创建缺失的表，已存在的表不动；返回新建的表名
    pub async fn run(&self) -> Result<Vec<String>> {
        let mut created = Vec::new();

        for (table, ddl) in SCHEMA {
            if self.table_exists(table).await? {
                info!("Table {} already exists", table);
                continue;
            }

            info!("Table {} does not exist, creating", table);
            self.create_table(table, ddl).await?;
            info!("Table {} created", table);
            created.push(table.to_string());
        }

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_covers_all_tables() {
        let names: Vec<&str> = SCHEMA.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["urls", "log_action", "log_error"]);
        assert!(SCHEMA[0].1.contains("hash text not null unique"));
    }

    #[test]
    fn test_rpc_url() {
        let migrator =
            SchemaMigrator::new("https://db.example.com/", "k", Duration::from_secs(1)).unwrap();
        assert_eq!(
            migrator.rpc_url("table_exists"),
            "https://db.example.com/rest/v1/rpc/table_exists"
        );
    }
}
