//! 配置校验
//!
//! 收集所有问题后一次性返回，方便一次改完配置文件。

use super::{StaticConfig, StoreBackend};
use crate::cache::memory::MAX_TTL_SECS;

/// 校验静态配置
pub fn validate_config(config: &StaticConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.server.host_name.trim().is_empty() {
        errors.push("server.host_name cannot be empty".to_string());
    }
    if config.server.port == 0 {
        errors.push("server.port must be greater than 0".to_string());
    }
    if let Some(public_url) = config.server.public_url.as_deref()
        && !public_url.trim().is_empty()
    {
        match url::Url::parse(public_url.trim()) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => errors.push(format!(
                "server.public_url must use http or https, got '{}'",
                parsed.scheme()
            )),
            Err(e) => errors.push(format!("server.public_url is not a valid URL: {}", e)),
        }
    }

    if config.store.backend == StoreBackend::Rest {
        if config.store.url.trim().is_empty() {
            errors.push("store.url is required for the rest backend".to_string());
        }
        if config.store.api_key.trim().is_empty() {
            errors.push("store.api_key is required for the rest backend".to_string());
        }
    }
    if config.store.timeout_secs == 0 {
        errors.push("store.timeout_secs must be greater than 0".to_string());
    }

    if config.cache.ttl_secs == 0 {
        errors.push("cache.ttl_secs must be greater than 0".to_string());
    }
    // 生成短链后立即返回，缓存必须撑到存储写入结束
    if config.cache.ttl_secs < config.store.timeout_secs {
        errors.push(format!(
            "cache.ttl_secs ({}) must not be shorter than store.timeout_secs ({})",
            config.cache.ttl_secs, config.store.timeout_secs
        ));
    }
    if config.cache.ttl_secs > MAX_TTL_SECS {
        errors.push(format!(
            "cache.ttl_secs must not exceed {} (one year)",
            MAX_TTL_SECS
        ));
    }
    if config.cache.sweep_interval_secs == 0 {
        errors.push("cache.sweep_interval_secs must be greater than 0".to_string());
    }
    for (name, secs) in [
        ("cache.sweep_interval_secs", config.cache.sweep_interval_secs),
        ("rate_limit.sweep_interval_secs", config.rate_limit.sweep_interval_secs),
    ] {
        if secs > MAX_TTL_SECS {
            errors.push(format!("{} must not exceed {}", name, MAX_TTL_SECS));
        }
    }

    let rl = &config.rate_limit;
    if rl.burst == 0 {
        errors.push("rate_limit.burst must be greater than 0".to_string());
    }
    if rl.refill_tokens == 0 {
        errors.push("rate_limit.refill_tokens must be greater than 0".to_string());
    }
    if rl.refill_period_secs == 0 {
        errors.push("rate_limit.refill_period_secs must be greater than 0".to_string());
    }
    if rl.sweep_interval_secs == 0 {
        errors.push("rate_limit.sweep_interval_secs must be greater than 0".to_string());
    }

    if config.bot.enabled && config.bot.token.trim().is_empty() {
        errors.push("bot.token is required when bot.enabled is true".to_string());
    }

    if !matches!(config.logging.format.as_str(), "text" | "json") {
        errors.push(format!(
            "logging.format must be 'text' or 'json', got '{}'",
            config.logging.format
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
