pub mod backends;
pub mod gateway;
pub mod migration;
pub mod models;

use std::sync::Arc;

use tracing::info;

pub use gateway::StoreGateway;
pub use migration::SchemaMigrator;
pub use models::{AuditAction, AuditError, Filter, ShortLink};

use crate::config::{StoreBackend, StoreConfig};
use crate::errors::Result;

pub struct StorageFactory;

impl StorageFactory {
    pub fn create(config: &StoreConfig) -> Result<Arc<dyn StoreGateway>> {
        let store: Arc<dyn StoreGateway> = match config.backend {
            StoreBackend::Rest => Arc::new(backends::RestStore::from_config(config)?),
            StoreBackend::Memory => Arc::new(backends::MemoryStore::new()),
        };

        info!("Using {} store backend", store.backend_name());
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_picks_backend() {
        let mut config = StoreConfig {
            backend: StoreBackend::Memory,
            ..StoreConfig::default()
        };
        assert_eq!(StorageFactory::create(&config).unwrap().backend_name(), "memory");

        config.backend = StoreBackend::Rest;
        config.url = "https://db.example.com".to_string();
        config.api_key = "k".to_string();
        assert_eq!(StorageFactory::create(&config).unwrap().backend_name(), "rest");
    }
}
