//! shortlink-bot - URL shortener with a Telegram front end
//!
//! Short codes are a deterministic hash of (url, owner), so shortening the
//! same link twice gives the same code. Lookups go cache first, then the
//! persistent store.
//!
//! # Features
//! - **server**: HTTP server mode (default)
//! - **bot**: Telegram bot front end (default)
//!
//! # Architecture
//! - `utils`: hashing, URL validation, client address extraction
//! - `cache`: in-process TTL cache
//! - `storage`: store gateway (REST / memory) and schema bootstrap
//! - `services`: link engine, rate limiter, audit trail
//! - `bot`: conversation state and message handling
//! - `api`: HTTP routes and middleware
//! - `config`: configuration loading and validation
//! - `runtime`: startup, server, shutdown
//! - `system`: logging

pub mod api;
pub mod bot;
pub mod cache;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
