pub mod analyzer;
pub mod api;
pub mod backoff;
pub mod blockchain;
pub mod checkpoint;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod watch_list;

pub use analyzer::{AnalyzerClient, TransactionDispatcher};
pub use backoff::{connect_with_backoff, BackoffPolicy};
pub use blockchain::{BlockRange, ChainClient, RpcClient, ScanEngine, ScanEngineConfig, TickOutcome, WatchSet};
pub use checkpoint::{resolve_checkpoint_path, CheckpointStore};
pub use config::{AnalyzerConfig, ApiConfig, AppConfig, LoggingConfig, RegistryConfig, RpcConfig, ScannerConfig};
pub use error::{Result, ScannerError};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use watch_list::{AddressRegistry, WatchListProvider};
