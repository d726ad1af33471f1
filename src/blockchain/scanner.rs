use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::analyzer::TransactionDispatcher;
use crate::blockchain::block_processor::BlockProcessor;
use crate::blockchain::rpc_client::ChainClient;
use crate::checkpoint::CheckpointStore;
use crate::config::ScannerConfig;
use crate::error::{DatabaseError, Result, ScannerError};
use crate::logging::{ErrorLogger, LogContext, MetricsLogger};
use crate::models::MatchedTransaction;
use crate::watch_list::WatchListProvider;

/// Optional sink that keeps a copy of every match
pub trait MatchRecorder: Send + Sync {
    fn record(&self, tx: &MatchedTransaction) -> std::result::Result<(), DatabaseError>;
}

#[derive(Debug, Clone)]
pub struct ScanEngineConfig {
    pub poll_interval: Duration,
    /// Blocks behind the head a fresh scanner starts from
    pub bootstrap_window: u64,
}

impl Default for ScanEngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            bootstrap_window: 1000,
        }
    }
}

impl From<&ScannerConfig> for ScanEngineConfig {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            bootstrap_window: config.bootstrap_window,
        }
    }
}

/// Inclusive block range for one tick; empty when `start > end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    pub fn compute(checkpoint: u64, height: u64, bootstrap_window: u64) -> Self {
        let start = if checkpoint == 0 && height > bootstrap_window {
            height - bootstrap_window
        } else {
            match checkpoint.checked_add(1) {
                Some(next) => next,
                // Nothing can follow the last representable block
                None => return Self::empty(),
            }
        };
        Self { start, end: height }
    }

    pub fn empty() -> Self {
        Self { start: 1, end: 0 }
    }

    /// True when a fresh scanner jumped ahead and left older blocks unscanned
    pub fn skips_history(&self, checkpoint: u64) -> bool {
        checkpoint == 0 && self.start > 1
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing new since the checkpoint
    Idle { checkpoint: u64, height: u64 },
    Advanced {
        from: u64,
        to: u64,
        blocks_scanned: u64,
        matches: usize,
        dispatch_failures: usize,
        checkpoint_persisted: bool,
    },
}

pub struct ScanEngine {
    chain: Arc<dyn ChainClient>,
    processor: BlockProcessor,
    watch_list: WatchListProvider,
    checkpoint: CheckpointStore,
    dispatcher: Option<Arc<dyn TransactionDispatcher>>,
    recorder: Option<Arc<dyn MatchRecorder>>,
    config: ScanEngineConfig,
}

impl ScanEngine {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        watch_list: WatchListProvider,
        checkpoint: CheckpointStore,
        config: ScanEngineConfig,
    ) -> Self {
        Self {
            processor: BlockProcessor::new(chain.clone()),
            chain,
            watch_list,
            checkpoint,
            dispatcher: None,
            recorder: None,
            config,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn TransactionDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn MatchRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn checkpoint_store(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// Scan everything between the checkpoint and the current head once
    pub async fn tick(&self) -> Result<TickOutcome> {
        self.tick_until(&CancellationToken::new()).await
    }

    async fn tick_until(&self, shutdown: &CancellationToken) -> Result<TickOutcome> {
        let (watch_set, source) = self.watch_list.resolve();
        let checkpoint = self.checkpoint.load()?;
        let height = self.chain.latest_height().await?;

        let range = BlockRange::compute(checkpoint, height, self.config.bootstrap_window);
        if range.is_empty() {
            LogContext::new("scanner", "tick")
                .with_block_number(height)
                .with_metadata("checkpoint", json!(checkpoint))
                .debug("No new blocks");
            return Ok(TickOutcome::Idle { checkpoint, height });
        }

        if range.skips_history(checkpoint) {
            LogContext::new("scanner", "bootstrap")
                .with_block_range(range.start, range.end)
                .info(&format!("Starting from recent block: {} (latest: {})", range.start, height));
        }

        LogContext::new("scanner", "tick")
            .with_block_range(range.start, range.end)
            .with_metadata("watch_list_size", json!(watch_set.len()))
            .with_metadata("watch_list_source", json!(format!("{:?}", source)))
            .debug(&format!("Scanning {} blocks", range.len()));

        let network_id = self.chain.network_id().await?;

        let mut last_completed: Option<u64> = None;
        let mut matches = 0usize;
        let mut dispatch_failures = 0usize;

        for block_number in range.start..=range.end {
            if shutdown.is_cancelled() {
                LogContext::new("scanner", "tick")
                    .with_block_number(block_number)
                    .info("Shutdown requested, stopping before block");
                break;
            }

            let found = match self.processor.process_block(block_number, network_id, &watch_set).await {
                Ok(found) => found,
                Err(source) => {
                    if let Some(done) = last_completed {
                        self.persist(checkpoint, done);
                    }
                    return Err(ScannerError::ScanAborted {
                        block_number,
                        last_completed,
                        source,
                    });
                }
            };

            for matched in &found.matches {
                matches += 1;
                if !self.handle_match(matched).await {
                    dispatch_failures += 1;
                }
            }

            last_completed = Some(block_number);
        }

        let to = match last_completed {
            Some(done) => done,
            None => return Ok(TickOutcome::Idle { checkpoint, height }),
        };

        let checkpoint_persisted = self.persist(checkpoint, to);
        let blocks_scanned = to - range.start + 1;
        MetricsLogger::log_tick_summary(height, to, blocks_scanned, matches, dispatch_failures);

        Ok(TickOutcome::Advanced {
            from: range.start,
            to,
            blocks_scanned,
            matches,
            dispatch_failures,
            checkpoint_persisted,
        })
    }

    /// Log, record and dispatch one match. Returns false if dispatch failed.
    async fn handle_match(&self, matched: &MatchedTransaction) -> bool {
        let payload = serde_json::to_value(matched).unwrap_or_default();
        LogContext::new("scanner", "match")
            .with_block_number(matched.block_num)
            .with_transaction_hash(&matched.hash)
            .with_metadata("transaction", payload)
            .info("Found relevant transaction");

        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.record(matched) {
                ErrorLogger::log_error(
                    &ScannerError::Database(e),
                    Some(LogContext::new("scanner", "record_match").with_transaction_hash(&matched.hash)),
                );
            }
        }

        let dispatcher = match &self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => return true,
        };

        match dispatcher.dispatch(matched).await {
            Ok(_) => true,
            Err(e) => {
                ErrorLogger::log_error(
                    &ScannerError::Analyzer(e),
                    Some(
                        LogContext::new("scanner", "dispatch")
                            .with_transaction_hash(&matched.hash)
                            .with_block_number(matched.block_num),
                    ),
                );
                false
            }
        }
    }

    /// Save `block_number` unless it would move the checkpoint backwards
    fn persist(&self, loaded: u64, block_number: u64) -> bool {
        if block_number <= loaded {
            return true;
        }

        match self.checkpoint.save(block_number) {
            Ok(()) => {
                LogContext::new("scanner", "persist_checkpoint")
                    .with_block_number(block_number)
                    .debug("Checkpoint advanced");
                true
            }
            Err(e) => {
                ErrorLogger::log_error(
                    &ScannerError::Checkpoint(e),
                    Some(LogContext::new("scanner", "persist_checkpoint").with_block_number(block_number)),
                );
                false
            }
        }
    }

    /// Tick, then wait out the poll interval, until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) {
        LogContext::new("scanner", "run")
            .with_metadata("poll_interval_seconds", json!(self.config.poll_interval.as_secs()))
            .with_metadata("dispatch_enabled", json!(self.dispatcher.is_some()))
            .info("Starting scan loop");

        if self.dispatcher.is_none() {
            LogContext::new("scanner", "run")
                .warn("AI analyzer URL not configured, matches will only be logged");
        }

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = self.tick_until(&shutdown).await {
                ErrorLogger::log_error(&e, Some(LogContext::new("scanner", "tick")));
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.config.poll_interval) => {}
            }
        }

        LogContext::new("scanner", "run").info("Scan loop stopped");
    }
}
