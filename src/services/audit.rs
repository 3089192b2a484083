//! 操作 / 错误审计
//!
//! 写入在后台任务里完成，调用方不等待；失败只记日志，不影响主流程。

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::storage::models::{LOG_ACTION_TABLE, LOG_ERROR_TABLE};
use crate::storage::{AuditAction, AuditError, StoreGateway};

/// 审计日志，方法立即返回
pub trait AuditLog: Send + Sync {
    fn log_action(&self, telegram_id: i64, action: &str);
    fn log_error(&self, telegram_id: i64, error: &str, error_code: &str);
}

/// 写入存储的 `log_action` / `log_error` 集合
pub struct StoreAuditLog {
    store: Arc<dyn StoreGateway>,
}

impl StoreAuditLog {
    pub fn new(store: Arc<dyn StoreGateway>) -> Self {
        Self { store }
    }

    fn spawn_insert(
        &self,
        collection: &'static str,
        record: Result<serde_json::Value, serde_json::Error>,
    ) -> Option<JoinHandle<()>> {
        let payload = match record {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to encode {} record: {}", collection, e);
                return None;
            }
        };
        let store = self.store.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = store.insert(collection, &payload).await {
                warn!("{} insert failed: {}", collection, e);
            }
        }))
    }

    pub(crate) fn write_action(&self, telegram_id: i64, action: &str) -> Option<JoinHandle<()>> {
        let record = AuditAction {
            telegram_id,
            action: action.to_string(),
        };
        self.spawn_insert(LOG_ACTION_TABLE, serde_json::to_value(&record))
    }

    pub(crate) fn write_error(
        &self,
        telegram_id: i64,
        error: &str,
        error_code: &str,
    ) -> Option<JoinHandle<()>> {
        let record = AuditError {
            telegram_id,
            error: error.to_string(),
            error_code: error_code.to_string(),
        };
        self.spawn_insert(LOG_ERROR_TABLE, serde_json::to_value(&record))
    }
}

impl AuditLog for StoreAuditLog {
    fn log_action(&self, telegram_id: i64, action: &str) {
        self.write_action(telegram_id, action);
    }

    fn log_error(&self, telegram_id: i64, error: &str, error_code: &str) {
        self.write_error(telegram_id, error, error_code);
    }
}
