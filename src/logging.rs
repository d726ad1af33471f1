use log::{debug, error, info, trace, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::LoggingConfig;
use crate::error::{ErrorSeverity, ScannerError};

/// Structured logging context for the scanner
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.with_metadata("block_number", json!(block_number))
    }

    pub fn with_block_range(self, start: u64, end: u64) -> Self {
        self.with_metadata("range_start", json!(start))
            .with_metadata("range_end", json!(end))
    }

    pub fn with_transaction_hash(self, tx_hash: &str) -> Self {
        self.with_metadata("transaction_hash", json!(tx_hash))
    }

    pub fn with_address(self, address: &str) -> Self {
        self.with_metadata("address", json!(address))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    pub fn with_attempt(self, attempt: u32) -> Self {
        self.with_metadata("attempt", json!(attempt))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut log_entry = json!({
            "timestamp": timestamp,
            "level": level,
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });

        for (key, value) in &self.metadata {
            log_entry[key] = value.clone();
        }

        log_entry.to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Times an operation and logs its duration when finished
pub struct PerformanceMonitor {
    pub start_time: SystemTime,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start_time: SystemTime::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
            .as_millis() as u64
    }

    pub fn finish(self) -> u64 {
        let duration = self.elapsed_ms();

        let mut context = LogContext::new("performance", &self.operation)
            .with_duration_ms(duration);

        for (key, value) in self.metadata {
            context = context.with_metadata(&key, value);
        }

        context.debug(&format!("Operation completed in {}ms", duration));
        duration
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.elapsed_ms();

        let mut context = LogContext::new("performance", &self.operation)
            .with_duration_ms(duration);

        for (key, value) in self.metadata {
            context = context.with_metadata(&key, value);
        }

        match result {
            Ok(_) => {
                context.debug(&format!("Operation completed successfully in {}ms", duration));
            }
            Err(e) => {
                context = context.with_metadata("error", json!(e.to_string()));
                context.warn(&format!("Operation failed after {}ms: {}", duration, e));
            }
        }

        duration
    }
}

/// Error logging utilities
pub struct ErrorLogger;

impl ErrorLogger {
    pub fn log_error(error: &ScannerError, context: Option<LogContext>) {
        let severity = error.severity();

        let log_context = context
            .unwrap_or_else(|| LogContext::new("error", "unknown"))
            .with_metadata("severity", json!(format!("{:?}", severity)))
            .with_metadata("recoverable", json!(error.is_recoverable()));

        let message = format!("Error occurred: {}", error);

        match severity {
            ErrorSeverity::Critical | ErrorSeverity::High => log_context.error(&message),
            ErrorSeverity::Medium => log_context.warn(&message),
            ErrorSeverity::Low => log_context.info(&message),
        }
    }

    pub fn log_connect_attempt(target: &str, attempt: u32, next_delay: Duration, error: &str) {
        let context = LogContext::new("backoff", "connect_attempt")
            .with_attempt(attempt)
            .with_metadata("target", json!(target))
            .with_metadata("next_delay_ms", json!(next_delay.as_millis() as u64));

        context.warn(&format!(
            "Connection attempt {} to {} failed, retrying in {}ms: {}",
            attempt,
            target,
            next_delay.as_millis(),
            error
        ));
    }

    pub fn log_connect_success(target: &str, attempts: u32, total_duration_ms: u64) {
        let context = LogContext::new("backoff", "connect_success")
            .with_attempt(attempts)
            .with_metadata("target", json!(target))
            .with_duration_ms(total_duration_ms);

        context.info(&format!(
            "Connected to {} after {} attempt(s) in {}ms",
            target, attempts, total_duration_ms
        ));
    }
}

/// Scanner metrics, emitted as structured log lines
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_block_scanned(block_number: u64, transaction_count: usize, match_count: usize, processing_time_ms: u64) {
        let context = LogContext::new("metrics", "block_scanned")
            .with_block_number(block_number)
            .with_metadata("transaction_count", json!(transaction_count))
            .with_metadata("match_count", json!(match_count))
            .with_duration_ms(processing_time_ms);

        if match_count > 0 {
            context.info(&format!(
                "Found {} relevant transactions in block {}",
                match_count, block_number
            ));
        } else {
            context.debug(&format!(
                "Scanned block {} ({} transactions)",
                block_number, transaction_count
            ));
        }
    }

    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.trace(&format!("RPC call {} completed in {}ms", method, duration_ms));
        } else {
            context.warn(&format!("RPC call {} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_dispatch(transaction_hash: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "analyzer_dispatch")
            .with_transaction_hash(transaction_hash)
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("Dispatched {} in {}ms", transaction_hash, duration_ms));
        } else {
            context.warn(&format!("Dispatch of {} failed after {}ms", transaction_hash, duration_ms));
        }
    }

    pub fn log_registry_query(address_count: usize, duration_ms: u64) {
        let context = LogContext::new("metrics", "registry_query")
            .with_metadata("address_count", json!(address_count))
            .with_duration_ms(duration_ms);

        context.debug(&format!("Registry returned {} addresses in {}ms", address_count, duration_ms));
    }

    pub fn log_tick_summary(
        latest_block: u64,
        checkpoint: u64,
        blocks_scanned: u64,
        matches: usize,
        dispatch_failures: usize,
    ) {
        let blocks_behind = latest_block.saturating_sub(checkpoint);
        let context = LogContext::new("metrics", "tick_summary")
            .with_metadata("latest_block", json!(latest_block))
            .with_metadata("checkpoint", json!(checkpoint))
            .with_metadata("blocks_behind", json!(blocks_behind))
            .with_metadata("blocks_scanned", json!(blocks_scanned))
            .with_metadata("matches", json!(matches))
            .with_metadata("dispatch_failures", json!(dispatch_failures));

        if dispatch_failures > 0 {
            context.warn(&format!(
                "Tick finished at block {} with {} matches, {} dispatch failures",
                checkpoint, matches, dispatch_failures
            ));
        } else {
            context.info(&format!(
                "Updated last processed block to {} ({} blocks, {} matches)",
                checkpoint, blocks_scanned, matches
            ));
        }
    }
}

/// Initialize structured logging for the application.
///
/// `RUST_LOG` still wins over the configured level when set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let level = log::LevelFilter::from_str(&config.level)?;
    let json_output = config.format == "json";

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .format(move |buf, record| {
            use std::io::Write;

            let message = record.args().to_string();
            match serde_json::from_str::<Value>(&message) {
                Ok(json_value) if json_output => writeln!(buf, "{}", json_value),
                Ok(json_value) => writeln!(buf, "{}", serde_json::to_string_pretty(&json_value)?),
                Err(_) if json_output => writeln!(
                    buf,
                    "{}",
                    json!({
                        "timestamp": chrono::Utc::now().to_rfc3339(),
                        "level": record.level().to_string(),
                        "target": record.target(),
                        "message": message,
                    })
                ),
                Err(_) => writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    message
                ),
            }
        })
        .try_init()?;

    info!("Structured logging initialized");
    Ok(())
}
