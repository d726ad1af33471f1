use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the wallet risk scanner
#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Registry error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connect(#[from] ConnectError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Scan aborted at block {block_number} (last completed: {last_completed:?}): {source}")]
    ScanAborted {
        block_number: u64,
        last_completed: Option<u64>,
        #[source]
        source: RpcError,
    },
}

/// RPC-related errors
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i64, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("HTTP status {status} from RPC endpoint")]
    HttpStatus { status: u16 },

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Block not found: {block_number}")]
    BlockNotFound { block_number: u64 },

    #[error("Sender recovery failed for {hash}: {reason}")]
    SenderRecovery { hash: String, reason: String },

    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Watch-list registry errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite failure: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
}

/// Checkpoint persistence errors
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint I/O failed at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint file {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Checkpoint encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Analyzer dispatch errors
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Analyzer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Analyzer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Analyzer response could not be decoded: {0}")]
    Decode(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required value: {0}")]
    MissingValue(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Errors from establishing a connection with backoff
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Connection to {target} cancelled")]
    Cancelled { target: String },

    #[error("Connection to {target} failed after {attempts} attempts in {elapsed_ms}ms: {last_error}")]
    Exhausted {
        target: String,
        attempts: u32,
        elapsed_ms: u64,
        last_error: String,
    },
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid hex quantity: {0}")]
    InvalidQuantity(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ScannerError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Errors that stop the process
    Critical,
    /// Errors that degrade functionality
    High,
    /// Errors that delay progress until a later tick
    Medium,
    /// Mostly informational
    Low,
}

impl ScannerError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ScannerError::Config(_) => ErrorSeverity::Critical,
            ScannerError::Checkpoint(CheckpointError::Corrupt { .. }) => ErrorSeverity::Critical,

            ScannerError::Rpc(RpcError::Connection(_)) => ErrorSeverity::High,
            ScannerError::Checkpoint(_) => ErrorSeverity::High,
            ScannerError::Connect(ConnectError::Exhausted { .. }) => ErrorSeverity::High,
            ScannerError::Database(DatabaseError::Sqlite(_)) => ErrorSeverity::High,

            ScannerError::Rpc(RpcError::Timeout { .. }) => ErrorSeverity::Medium,
            ScannerError::ScanAborted { .. } => ErrorSeverity::Medium,
            ScannerError::Analyzer(_) => ErrorSeverity::Medium,

            ScannerError::Validation(_) => ErrorSeverity::Low,
            ScannerError::Rpc(RpcError::BlockNotFound { .. }) => ErrorSeverity::Low,
            ScannerError::Rpc(RpcError::SenderRecovery { .. }) => ErrorSeverity::Low,
            ScannerError::Connect(ConnectError::Cancelled { .. }) => ErrorSeverity::Low,
            _ => ErrorSeverity::Medium,
        }
    }

    /// Whether the next tick (or the next attempt) may succeed without intervention
    pub fn is_recoverable(&self) -> bool {
        match self {
            ScannerError::Rpc(RpcError::Timeout { .. }) => true,
            ScannerError::Rpc(RpcError::Connection(_)) => true,
            ScannerError::Rpc(RpcError::Http(_)) => true,
            ScannerError::Rpc(RpcError::HttpStatus { status }) => *status >= 500 || *status == 429,
            ScannerError::Rpc(RpcError::BlockNotFound { .. }) => true,
            ScannerError::ScanAborted { .. } => true,
            ScannerError::Analyzer(_) => true,
            ScannerError::Database(DatabaseError::Lock(_)) => true,
            ScannerError::Database(DatabaseError::Sqlite(_)) => true,
            ScannerError::Checkpoint(CheckpointError::Io { .. }) => true,
            ScannerError::Connect(ConnectError::Exhausted { .. }) => true,

            ScannerError::Config(_) => false,
            ScannerError::Validation(_) => false,
            ScannerError::Checkpoint(CheckpointError::Corrupt { .. }) => false,
            ScannerError::Connect(ConnectError::Cancelled { .. }) => false,

            _ => false,
        }
    }
}
