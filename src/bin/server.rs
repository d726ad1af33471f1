use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wallet_risk_scanner::api::ApiServer;
use wallet_risk_scanner::config::AppConfig;
use wallet_risk_scanner::database::{registry_path, Database};
use wallet_risk_scanner::error::ScannerError;
use wallet_risk_scanner::logging::{init_logging, ErrorLogger, LogContext};

const DEFAULT_REGISTRY: &str = "registry.db";

#[derive(Parser)]
#[command(name = "registry-server")]
#[command(about = "HTTP API for managing the wallet watch-list registry")]
#[command(version)]
struct Args {
    /// Registry path or sqlite:// URL (defaults to DATABASE_URL / registry.url)
    #[arg(long)]
    database: Option<String>,

    /// Server port (defaults to API_PORT / api.port)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    print_server_banner();

    let args = Args::parse();

    // The API server is usable without a scanner config file
    let (config, config_error) = AppConfig::load_or_default();
    init_logging(&config.logging)?;
    if let Some(e) = config_error {
        ErrorLogger::log_error(&ScannerError::Config(e), Some(LogContext::new("server", "config")));
        LogContext::new("server", "config").warn("Falling back to default configuration");
    }

    let registry = args
        .database
        .or_else(|| config.registry.url.clone())
        .unwrap_or_else(|| DEFAULT_REGISTRY.to_string());
    let port = args.port.unwrap_or(config.api.port);

    let database = Database::new(registry_path(&registry))
        .map_err(|e| format!("Failed to open registry {}: {}", registry, e))?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Received shutdown signal");
                signal_token.cancel();
            }
            Err(err) => log::error!("Unable to listen for shutdown signal: {}", err),
        }
    });

    let server = ApiServer::new(Arc::new(database), config.api.host.clone(), port);
    if let Err(e) = server.start(shutdown).await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}

fn print_server_banner() {
    println!("+--------------------------------------------------------------+");
    println!("|               Wallet Risk Scanner: Registry API              |");
    println!("|                                                              |");
    println!("|          POST/GET/PUT/DELETE /addresses, GET /health         |");
    println!("+--------------------------------------------------------------+");
    println!();
}
