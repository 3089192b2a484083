//! Service layer
//!
//! Business logic shared by the HTTP API and the bot.

pub mod audit;
mod link_service;
pub mod rate_limiter;

pub use audit::{AuditLog, StoreAuditLog};
pub use link_service::*;
pub use rate_limiter::{RateLimitSettings, RateLimiter};
