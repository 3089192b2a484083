use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 短链接表
pub const URLS_TABLE: &str = "urls";
/// 用户操作日志表
pub const LOG_ACTION_TABLE: &str = "log_action";
/// 错误日志表
pub const LOG_ERROR_TABLE: &str = "log_error";

/// 短链接记录，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLink {
    pub hash: String,
    pub original_url: String,
    #[serde(default)]
    pub owner_id: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ShortLink {
    pub fn new(hash: impl Into<String>, original_url: impl Into<String>, owner_id: i64) -> Self {
        Self {
            hash: hash.into(),
            original_url: original_url.into(),
            owner_id,
            created_at: Utc::now(),
        }
    }
}

/// 用户操作记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditAction {
    pub telegram_id: i64,
    pub action: String,
}

/// 错误记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditError {
    pub telegram_id: i64,
    pub error: String,
    pub error_code: String,
}

/// 等值过滤条件，按添加顺序保存
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<(String, String)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// PostgREST 查询参数：`column=eq.value`
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.conditions
            .iter()
            .map(|(k, v)| (k.clone(), format!("eq.{}", v)))
            .collect()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}
