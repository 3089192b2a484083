use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::bot::ConversationStateStore;
use crate::cache::TtlCache;
use crate::config::{StaticConfig, StoreBackend};
use crate::services::{
    AuditFailureHook, AuditLog, LinkService, RateLimiter, StoreAuditLog,
};
use crate::storage::{SchemaMigrator, StorageFactory, StoreGateway};

/// 进程内唯一的一组组件
pub struct StartupContext {
    pub store: Arc<dyn StoreGateway>,
    pub cache: TtlCache,
    pub limiter: RateLimiter,
    pub audit: Arc<dyn AuditLog>,
    pub link_service: Arc<LinkService>,
    pub conversation_states: Arc<ConversationStateStore>,
    /// 后台清理任务，关闭时 abort
    pub background_tasks: Vec<JoinHandle<()>>,
}

impl StartupContext {
    pub fn abort_background_tasks(&mut self) {
        for task in self.background_tasks.drain(..) {
            task.abort();
        }
    }
}

/// 准备服务器启动的上下文
///
/// 存储、表结构、缓存、限流器、引擎，以及两个后台清理任务
pub async fn prepare_server_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let store = StorageFactory::create(&config.store).context("Failed to create store backend")?;

    if config.store.run_migrations && config.store.backend == StoreBackend::Rest {
        let migrator =
            SchemaMigrator::from_config(&config.store).context("Failed to create migrator")?;
        let created = migrator
            .run()
            .await
            .context("Failed to bootstrap store schema")?;
        info!("Schema check finished, {} table(s) created", created.len());
    }

    let cache = TtlCache::new();
    let limiter = RateLimiter::from_config(&config.rate_limit);
    let audit: Arc<dyn AuditLog> = Arc::new(StoreAuditLog::new(store.clone()));

    let link_service = Arc::new(LinkService::new(
        store.clone(),
        Arc::new(cache.clone()),
        Arc::new(AuditFailureHook::new(audit.clone())),
        config.public_base_url(),
        Duration::from_secs(config.cache.ttl_secs),
    ));

    let background_tasks = vec![
        cache.spawn_sweeper(Duration::from_secs(config.cache.sweep_interval_secs)),
        limiter.spawn_sweeper(Duration::from_secs(config.rate_limit.sweep_interval_secs)),
    ];

    info!(
        "Pre-startup completed in {} ms, short links at {}",
        start_time.elapsed().as_millis(),
        config.public_base_url()
    );

    Ok(StartupContext {
        store,
        cache,
        limiter,
        audit,
        link_service,
        conversation_states: Arc::new(ConversationStateStore::new()),
        background_tasks,
    })
}
