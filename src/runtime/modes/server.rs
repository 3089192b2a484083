//! Server mode
//!
//! Starts the HTTP server, the background sweepers and, when enabled, the
//! Telegram bot, then waits for a shutdown signal.

use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api::{self, ApiSettings, middleware::RateLimit};
use crate::config::StaticConfig;
use crate::runtime::lifetime;

/// Run the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server(config: StaticConfig) -> Result<()> {
    let mut startup = lifetime::startup::prepare_server_startup(&config)
        .await
        .map_err(|e| {
            tracing::error!("Server startup failed: {}", e);
            e
        })?;

    #[cfg(feature = "bot")]
    if config.bot.enabled {
        startup.background_tasks.push(spawn_bot(&config, &startup));
    }

    let link_service = startup.link_service.clone();
    let limiter = startup.limiter.clone();
    let audit = startup.audit.clone();
    let trusted_proxies = config.server.trusted_proxies.clone();
    let settings = ApiSettings::from(&config);

    if !trusted_proxies.is_empty() {
        warn!(
            "Rate limiting: forwarded client addresses accepted from {:?}",
            trusted_proxies
        );
    }

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(RateLimit::new(limiter.clone(), trusted_proxies.clone()))
            .wrap(DefaultHeaders::new().add(("Cache-Control", "no-cache, no-store, must-revalidate")))
            .app_data(web::Data::new(link_service.clone()))
            .app_data(web::Data::new(settings))
            .app_data(web::Data::new(audit.clone()))
            .app_data(web::PayloadConfig::new(64 * 1024))
            .configure(api::configure)
            .default_service(web::to(api::not_found))
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .workers(cpu_count)
    .disable_signals()
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    warn!("Starting server at http://{}", bind_address);
    let handle = server.handle();

    tokio::select! {
        res = server => {
            res.context("HTTP server failed")?;
        }
        _ = lifetime::shutdown::listen_for_shutdown() => {
            handle.stop(true).await;
            warn!("Graceful shutdown: HTTP server stopped");
        }
    }

    startup.abort_background_tasks();
    info!("Background tasks stopped");
    Ok(())
}

#[cfg(feature = "bot")]
fn spawn_bot(
    config: &StaticConfig,
    startup: &lifetime::startup::StartupContext,
) -> tokio::task::JoinHandle<()> {
    use std::sync::Arc;

    use crate::bot::BotHandler;
    use crate::bot::telegram::{TelegramTransport, run_bot};

    let transport = Arc::new(TelegramTransport::new(&config.bot.token));
    let bot = transport.bot();

    let mut handler = BotHandler::new(
        startup.link_service.clone(),
        startup.conversation_states.clone(),
        transport,
        startup.audit.clone(),
    );
    if config.bot.rate_limit_chats {
        // 与 HTTP 共用同一个限流器，键空间 chat:<id> 不会与 IP 冲突
        handler = handler.with_rate_limiter(startup.limiter.clone());
    }

    info!("Telegram bot enabled");
    tokio::spawn(run_bot(bot, Arc::new(handler)))
}
