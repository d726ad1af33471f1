use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use wallet_risk_scanner::analyzer::AnalyzerClient;
use wallet_risk_scanner::api::ApiServer;
use wallet_risk_scanner::backoff::BackoffPolicy;
use wallet_risk_scanner::blockchain::{ChainClient, RpcClient, ScanEngine, ScanEngineConfig};
use wallet_risk_scanner::checkpoint::CheckpointStore;
use wallet_risk_scanner::config::AppConfig;
use wallet_risk_scanner::database::Database;
use wallet_risk_scanner::error::ScannerError;
use wallet_risk_scanner::logging::{init_logging, ErrorLogger, LogContext};
use wallet_risk_scanner::watch_list::{AddressRegistry, WatchListProvider};

#[derive(Parser)]
#[command(name = "scanner")]
#[command(about = "Scans new blocks for transactions touching watched wallets and forwards them for risk analysis")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to CONFIG_FILE or ./config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single scan tick and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match AppConfig::load_from(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.logging)?;

    LogContext::new("main", "startup")
        .with_metadata("rpc_endpoint", json!(config.rpc.endpoint))
        .with_metadata("static_wallets", json!(config.scanner.wallets.len()))
        .with_metadata("checkpoint_path", json!(config.scanner.checkpoint_path))
        .info("Starting wallet risk scanner");

    let rpc = RpcClient::new(config.rpc.endpoint.clone(), config.rpc.timeout_seconds)?;
    let network_id = match rpc.network_id().await {
        Ok(id) => id,
        Err(e) => {
            let error = ScannerError::Rpc(e);
            ErrorLogger::log_error(&error, Some(LogContext::new("main", "network_probe")));
            return Err(error.into());
        }
    };
    LogContext::new("main", "network_probe")
        .with_metadata("network_id", json!(network_id))
        .info("Connected to RPC endpoint");

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

    let registry = match &config.registry.url {
        Some(url) => {
            let policy = BackoffPolicy::with_max_wait(config.registry.connect_timeout());
            match Database::connect_with_backoff(url, &policy, &shutdown).await {
                Ok(db) => Some(Arc::new(db)),
                Err(e) => {
                    ErrorLogger::log_error(
                        &ScannerError::Connect(e),
                        Some(LogContext::new("main", "registry_connect")),
                    );
                    LogContext::new("main", "registry_connect")
                        .warn("Continuing with the static wallet list only");
                    None
                }
            }
        }
        None => None,
    };

    let watch_list = WatchListProvider::new(
        registry.clone().map(|db| db as Arc<dyn AddressRegistry>),
        config.scanner.wallets.clone(),
    );

    let mut engine = ScanEngine::new(
        Arc::new(rpc),
        watch_list,
        CheckpointStore::new(&config.scanner.checkpoint_path),
        ScanEngineConfig::from(&config.scanner),
    );

    if let Some(url) = &config.analyzer.url {
        engine = engine.with_dispatcher(Arc::new(AnalyzerClient::new(url, config.analyzer.timeout_seconds)?));
    }
    if let Some(db) = &registry {
        engine = engine.with_recorder(db.clone());
    }

    let api = match (&registry, config.api.enabled) {
        (Some(db), true) => Some(ApiServer::new(db.clone(), config.api.host.clone(), config.api.port).spawn(&shutdown)),
        (None, true) => {
            LogContext::new("main", "api").warn("API enabled but no registry is available, not serving");
            None
        }
        _ => None,
    };

    let outcome = if args.once {
        engine.tick().await.map(Some)
    } else {
        engine.run(shutdown.clone()).await;
        Ok(None)
    };

    shutdown.cancel();
    if let Some(api) = api {
        api.stop().await;
    }

    if let Some(outcome) = outcome? {
        LogContext::new("main", "once")
            .with_metadata("outcome", json!(format!("{:?}", outcome)))
            .info("Single tick finished");
    }

    Ok(())
}
