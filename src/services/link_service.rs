//! Short link generation and resolution
//!
//! Shared by the HTTP handlers and the bot. Generation answers before the
//! store write finishes; resolution goes cache first, then the store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheResult, ObjectCache};
use crate::errors::{Result, ShortlinkError};
use crate::services::audit::AuditLog;
use crate::storage::models::URLS_TABLE;
use crate::storage::{Filter, ShortLink, StoreGateway};
use crate::utils::hasher::{compute_code, is_valid_code};
use crate::utils::url_validator::{validate_url, validation_error_message};

// ============ Result types ============

/// Where a resolved URL came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveSource {
    Cache,
    Store,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub url: String,
    pub source: ResolveSource,
}

/// Result of `generate`
///
/// Dropping `persistence` detaches the background store write.
#[derive(Debug)]
pub struct GeneratedLink {
    pub code: String,
    pub short_url: String,
    pub persistence: JoinHandle<()>,
}

/// Background store write that did not go through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceFailure {
    /// The store refused or could not be reached
    Store {
        code: String,
        owner_id: i64,
        error: ShortlinkError,
    },
    /// Code already taken by a different URL (hash collision)
    Collision {
        code: String,
        owner_id: i64,
        requested_url: String,
        existing_url: String,
    },
}

impl PersistenceFailure {
    pub fn owner_id(&self) -> i64 {
        match self {
            Self::Store { owner_id, .. } | Self::Collision { owner_id, .. } => *owner_id,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Store { error, .. } => error.code(),
            Self::Collision { .. } => ShortlinkError::store_rejected("").code(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Store { code, error, .. } => {
                format!("Failed to persist code {}: {}", code, error)
            }
            Self::Collision {
                code,
                requested_url,
                existing_url,
                ..
            } => format!(
                "Code {} already maps to {}, requested {}",
                code, existing_url, requested_url
            ),
        }
    }
}

/// Observer for failed background writes
#[async_trait]
pub trait FailureHook: Send + Sync {
    async fn on_persistence_failure(&self, failure: PersistenceFailure);
}

/// Logs the failure and records it in the audit trail
pub struct AuditFailureHook {
    audit: Arc<dyn AuditLog>,
}

impl AuditFailureHook {
    pub fn new(audit: Arc<dyn AuditLog>) -> Self {
        Self { audit }
    }
}

#[async_trait]
impl FailureHook for AuditFailureHook {
    async fn on_persistence_failure(&self, failure: PersistenceFailure) {
        let message = failure.describe();
        error!("{}", message);
        self.audit
            .log_error(failure.owner_id(), &message, failure.error_code());
    }
}

// ============ LinkService Implementation ============

pub struct LinkService {
    store: Arc<dyn StoreGateway>,
    cache: Arc<dyn ObjectCache>,
    hook: Arc<dyn FailureHook>,
    base_url: String,
    cache_ttl: Duration,
}

impl LinkService {
    pub fn new(
        store: Arc<dyn StoreGateway>,
        cache: Arc<dyn ObjectCache>,
        hook: Arc<dyn FailureHook>,
        base_url: impl Into<String>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            hook,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache_ttl,
        }
    }

    /// `scheme://host/code`
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }

    /// Shorten `url` on behalf of `owner_id`
    ///
    /// Invalid input is rejected before anything is touched. The mapping is
    /// cached right away and written to the store by a detached task; store
    /// failures go to the failure hook, never to the caller.
    pub async fn generate(&self, url: &str, owner_id: i64) -> Result<GeneratedLink> {
        validate_url(url).map_err(|e| {
            debug!("Rejected URL {:?}: {}", url, e);
            ShortlinkError::invalid_input(validation_error_message(&e))
        })?;

        let url = url.trim().to_string();
        let code = compute_code(&url, owner_id);

        if let Some(existing) = self
            .cache
            .set_unless_conflict(code.clone(), url.clone(), self.cache_ttl)
            .await
        {
            warn!(
                "Code {} already cached for {}, keeping it (requested {})",
                code, existing, url
            );
        }

        let link = ShortLink::new(code.clone(), url, owner_id);
        let persistence = tokio::spawn(persist(
            self.store.clone(),
            self.cache.clone(),
            self.hook.clone(),
            link,
            self.cache_ttl,
        ));

        let short_url = self.short_url(&code);
        info!("Generated {} for owner {}", short_url, owner_id);

        Ok(GeneratedLink {
            code,
            short_url,
            persistence,
        })
    }

    /// Look up the original URL for `code`
    pub async fn resolve(&self, code: &str) -> Result<Resolved> {
        if !is_valid_code(code) {
            return Err(ShortlinkError::not_found(format!("Unknown code {}", code)));
        }

        if let CacheResult::Found(url) = self.cache.get(code).await {
            debug!("Cache hit for {}", code);
            return Ok(Resolved {
                url,
                source: ResolveSource::Cache,
            });
        }

        let bytes = self
            .store
            .get(URLS_TABLE, &Filter::new().eq("hash", code))
            .await
            .map_err(|e| match e {
                ShortlinkError::NotFound(_) => {
                    ShortlinkError::not_found(format!("Unknown code {}", code))
                }
                other => {
                    warn!("Store lookup for {} failed: {}", code, other);
                    other
                }
            })?;

        let link: ShortLink = serde_json::from_slice(&bytes).map_err(|e| {
            ShortlinkError::server_error(format!("Undecodable record for {}: {}", code, e))
        })?;

        self.cache
            .set(code.to_string(), link.original_url.clone(), self.cache_ttl)
            .await;
        debug!("Fetched and cached {}", code);

        Ok(Resolved {
            url: link.original_url,
            source: ResolveSource::Store,
        })
    }

    /// Administrative delete: store first, then the cache
    pub async fn remove(&self, code: &str) -> Result<()> {
        self.store
            .delete(URLS_TABLE, &Filter::new().eq("hash", code))
            .await?;
        self.cache.delete(code).await;
        info!("Removed code {}", code);
        Ok(())
    }
}

/// Background store write for a freshly generated link
async fn persist(
    store: Arc<dyn StoreGateway>,
    cache: Arc<dyn ObjectCache>,
    hook: Arc<dyn FailureHook>,
    link: ShortLink,
    cache_ttl: Duration,
) {
    let record = match serde_json::to_value(&link) {
        Ok(record) => record,
        Err(e) => {
            hook.on_persistence_failure(PersistenceFailure::Store {
                code: link.hash,
                owner_id: link.owner_id,
                error: e.into(),
            })
            .await;
            return;
        }
    };

    let error = match store.insert(URLS_TABLE, &record).await {
        Ok(_) => {
            debug!("Persisted code {}", link.hash);
            return;
        }
        Err(e) => e,
    };

    // 重复键：可能是同一链接的重复提交，也可能是哈希碰撞
    if matches!(error, ShortlinkError::StoreRejected(_))
        && let Some(existing) = stored_url(store.as_ref(), &link.hash).await
    {
        if existing == link.original_url {
            debug!("Code {} already persisted", link.hash);
            return;
        }
        // 存储保留第一个写入者，缓存跟随存储
        cache
            .set(link.hash.clone(), existing.clone(), cache_ttl)
            .await;
        hook.on_persistence_failure(PersistenceFailure::Collision {
            code: link.hash,
            owner_id: link.owner_id,
            requested_url: link.original_url,
            existing_url: existing,
        })
        .await;
        return;
    }

    hook.on_persistence_failure(PersistenceFailure::Store {
        code: link.hash,
        owner_id: link.owner_id,
        error,
    })
    .await;
}

async fn stored_url(store: &dyn StoreGateway, code: &str) -> Option<String> {
    let bytes = store
        .get(URLS_TABLE, &Filter::new().eq("hash", code))
        .await
        .ok()?;
    serde_json::from_slice::<ShortLink>(&bytes)
        .ok()
        .map(|link| link.original_url)
}
