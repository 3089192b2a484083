use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use serde_json::Value;

use crate::errors::{Result, ShortlinkError};
use crate::storage::gateway::StoreGateway;
use crate::storage::models::{Filter, URLS_TABLE};

/// 进程内存储
///
/// 每个集合是一组 JSON 记录；带唯一键的集合拒绝重复写入，行为与 REST 后端一致。
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
    unique_keys: HashMap<String, String>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut unique_keys = HashMap::new();
        unique_keys.insert(URLS_TABLE.to_string(), "hash".to_string());
        Self {
            collections: RwLock::new(HashMap::new()),
            unique_keys,
        }
    }

    /// 集合中的记录数
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// 过滤值统一按字符串比较（数字列写成 "42"）
fn field_matches(record: &Value, column: &str, expected: &str) -> bool {
    match record.get(column) {
        Some(Value::String(s)) => s == expected,
        Some(Value::Null) | None => false,
        Some(other) => other.to_string() == expected,
    }
}

fn matches_filter(record: &Value, filter: &Filter) -> bool {
    filter
        .conditions()
        .iter()
        .all(|(column, value)| field_matches(record, column, value))
}

#[async_trait]
impl StoreGateway for MemoryStore {
    async fn get(&self, collection: &str, filter: &Filter) -> Result<Bytes> {
        let collections = self.collections.read();
        let record = collections
            .get(collection)
            .and_then(|records| records.iter().find(|r| matches_filter(r, filter)))
            .ok_or_else(|| {
                ShortlinkError::not_found(format!("No record matches {}?{}", collection, filter))
            })?;

        Ok(Bytes::from(serde_json::to_vec(record)?))
    }

    async fn insert(&self, collection: &str, record: &Value) -> Result<Bytes> {
        if !record.is_object() {
            return Err(ShortlinkError::store_rejected(
                "Record must be a JSON object",
            ));
        }

        let mut collections = self.collections.write();
        let records = collections.entry(collection.to_string()).or_default();

        if let Some(key) = self.unique_keys.get(collection) {
            let Some(value) = record.get(key) else {
                return Err(ShortlinkError::store_rejected(format!(
                    "Missing unique column '{}' for {}",
                    key, collection
                )));
            };
            if records.iter().any(|r| r.get(key) == Some(value)) {
                return Err(ShortlinkError::store_rejected(format!(
                    "Duplicate record for {}: {}={}",
                    collection, key, value
                )));
            }
        }

        records.push(record.clone());
        // 与 PostgREST 的 return=representation 一致，返回数组
        Ok(Bytes::from(serde_json::to_vec(&[record])?))
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<()> {
        if filter.is_empty() {
            return Err(ShortlinkError::invalid_input(
                "Refusing to delete without a filter",
            ));
        }

        if let Some(records) = self.collections.write().get_mut(collection) {
            records.retain(|r| !matches_filter(r, filter));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
