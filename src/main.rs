use anyhow::{Context, Result};
use clap::Parser;

use shortlink_bot::config::{DEFAULT_CONFIG_PATH, StaticConfig};
use shortlink_bot::runtime::modes::run_server;
use shortlink_bot::system::logging::init_logging;

/// URL shortener with a Telegram bot front end
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let config = match StaticConfig::load(&args.config).and_then(StaticConfig::validated) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e.format_colored());
            std::process::exit(1);
        }
    };

    if args.check {
        println!("Configuration OK");
        return Ok(());
    }

    let _guard = init_logging(&config.logging).context("Failed to initialize logging")?;

    run_server(config).await
}
