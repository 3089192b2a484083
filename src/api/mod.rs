pub mod middleware;
pub mod services;

pub use services::{ApiSettings, configure, not_found};
