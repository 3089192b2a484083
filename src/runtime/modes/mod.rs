//! Mode routing
//!
//! Only the HTTP server mode exists; the bot runs inside it when enabled.

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "server")]
pub use server::run_server;
