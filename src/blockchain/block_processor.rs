use serde_json::json;
use std::sync::Arc;

use crate::blockchain::rpc_client::{hex_quantity_to_decimal, parse_hex_to_u64, Block, ChainClient, Transaction};
use crate::blockchain::watch_set::{normalize_address, WatchSet, ZERO_ADDRESS};
use crate::error::{RpcError, ValidationError};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::MatchedTransaction;

/// Result of scanning one block
#[derive(Debug, Clone)]
pub struct BlockMatches {
    pub block_number: u64,
    pub transaction_count: usize,
    pub matches: Vec<MatchedTransaction>,
    /// Transactions dropped because their sender or fields could not be decoded
    pub skipped: usize,
}

pub struct BlockProcessor {
    chain: Arc<dyn ChainClient>,
}

impl BlockProcessor {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }

    /// Fetch a block and extract the transactions touching `watch_set`
    pub async fn process_block(
        &self,
        block_number: u64,
        network_id: u64,
        watch_set: &WatchSet,
    ) -> Result<BlockMatches, RpcError> {
        let monitor = PerformanceMonitor::new("process_block").with_metadata("block_number", json!(block_number));

        let block = self.chain.block_by_number(block_number).await?;
        let result = self.match_block(&block, network_id, watch_set);

        let duration = monitor.finish();
        MetricsLogger::log_block_scanned(block_number, result.transaction_count, result.matches.len(), duration);

        Ok(result)
    }

    /// Filter an already fetched block. A transaction matches at most once.
    pub fn match_block(&self, block: &Block, network_id: u64, watch_set: &WatchSet) -> BlockMatches {
        let mut matches = Vec::new();
        let mut skipped = 0;

        for tx in &block.transactions {
            let sender = match self.chain.sender_recovery(tx, network_id) {
                Ok(sender) => sender,
                Err(e) => {
                    skipped += 1;
                    LogContext::new("block_processor", "sender_recovery")
                        .with_block_number(block.number)
                        .with_transaction_hash(&tx.hash)
                        .warn(&format!("Skipping transaction: {}", e));
                    continue;
                }
            };

            let recipient = match recipient_address(tx) {
                Ok(recipient) => recipient,
                Err(e) => {
                    skipped += 1;
                    LogContext::new("block_processor", "decode_recipient")
                        .with_block_number(block.number)
                        .with_transaction_hash(&tx.hash)
                        .warn(&format!("Skipping transaction: {}", e));
                    continue;
                }
            };

            if !watch_set.contains_canonical(&sender) && !watch_set.contains_canonical(&recipient) {
                continue;
            }

            match build_matched_transaction(tx, sender, recipient, block) {
                Ok(matched) => matches.push(matched),
                Err(e) => {
                    skipped += 1;
                    LogContext::new("block_processor", "decode_transaction")
                        .with_block_number(block.number)
                        .with_transaction_hash(&tx.hash)
                        .warn(&format!("Skipping matched transaction with undecodable fields: {}", e));
                }
            }
        }

        BlockMatches {
            block_number: block.number,
            transaction_count: block.transactions.len(),
            matches,
            skipped,
        }
    }
}

/// Canonical recipient; contract creations map to the zero address
pub fn recipient_address(tx: &Transaction) -> Result<String, ValidationError> {
    match tx.to.as_deref() {
        Some(to) => normalize_address(to),
        None => Ok(ZERO_ADDRESS.to_string()),
    }
}

/// Decode a transaction into the analyzer's payload
pub fn build_matched_transaction(
    tx: &Transaction,
    from: String,
    to: String,
    block: &Block,
) -> Result<MatchedTransaction, ValidationError> {
    let gas_price = match tx.gas_price.as_deref() {
        Some(price) => hex_quantity_to_decimal(price)?,
        None => "0".to_string(),
    };

    let input = tx.input.strip_prefix("0x").unwrap_or(&tx.input).to_lowercase();
    if !input.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidQuantity(format!("input of {}", tx.hash)));
    }

    Ok(MatchedTransaction {
        hash: tx.hash.clone(),
        from,
        to,
        value: hex_quantity_to_decimal(&tx.value)?,
        gas: parse_hex_to_u64(&tx.gas)?,
        gas_price,
        block_num: block.number,
        timestamp: block.timestamp,
        input,
    })
}
