use async_trait::async_trait;
use primitive_types::U256;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::blockchain::watch_set::normalize_address;
use crate::error::{RpcError, ValidationError};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[serde(default)]
    result: Option<Value>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    number: String,
    timestamp: String,
    #[serde(default)]
    transactions: Vec<Transaction>,
}

/// Block with its full transaction objects
#[derive(Debug, Clone)]
pub struct Block {
    pub number: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
}

/// Transaction as reported by the node; quantities stay hex-encoded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub gas: String,
    #[serde(rename = "gasPrice", default)]
    pub gas_price: Option<String>,
    #[serde(default)]
    pub input: String,
    #[serde(rename = "chainId", default)]
    pub chain_id: Option<String>,
    #[serde(default)]
    pub v: Option<String>,
}

impl TryFrom<RawBlock> for Block {
    type Error = RpcError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        let number = parse_hex_to_u64(&raw.number)
            .map_err(|e| RpcError::InvalidResponse(format!("block number: {}", e)))?;
        let timestamp = parse_hex_to_u64(&raw.timestamp)
            .map_err(|e| RpcError::InvalidResponse(format!("block timestamp: {}", e)))?;

        Ok(Block {
            number,
            timestamp,
            transactions: raw.transactions,
        })
    }
}

/// Read access to the chain, as needed by the scan engine
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current chain height
    async fn latest_height(&self) -> Result<u64, RpcError>;

    /// Block with full transactions; a missing block is `BlockNotFound`
    async fn block_by_number(&self, block_number: u64) -> Result<Block, RpcError>;

    /// Network id used for replay-protection checks
    async fn network_id(&self) -> Result<u64, RpcError>;

    /// Canonical sender of `tx`, checked against the replay-protection rules of `network_id`
    fn sender_recovery(&self, tx: &Transaction, network_id: u64) -> Result<String, RpcError> {
        recover_sender(tx, network_id)
    }
}

/// Chain id a transaction is bound to, if any.
///
/// Typed transactions carry `chainId`. Legacy transactions encode it in `v`
/// when `v >= 35`; older legacy signatures (27/28) carry none.
pub fn replay_chain_id(tx: &Transaction) -> Result<Option<u64>, ValidationError> {
    if let Some(chain_id) = tx.chain_id.as_deref() {
        return parse_hex_to_u64(chain_id).map(Some);
    }

    match tx.v.as_deref() {
        Some(v) => {
            let v = parse_hex_to_u64(v)?;
            if v >= 35 {
                Ok(Some((v - 35) / 2))
            } else {
                Ok(None)
            }
        }
        None => Ok(None),
    }
}

/// Sender of `tx` in canonical form
pub fn recover_sender(tx: &Transaction, network_id: u64) -> Result<String, RpcError> {
    let recovery_error = |reason: String| RpcError::SenderRecovery {
        hash: tx.hash.clone(),
        reason,
    };

    let from = tx
        .from
        .as_deref()
        .ok_or_else(|| recovery_error("node did not report a sender".to_string()))?;
    let sender = normalize_address(from).map_err(|e| recovery_error(e.to_string()))?;

    match replay_chain_id(tx).map_err(|e| recovery_error(e.to_string()))? {
        Some(chain_id) if chain_id != network_id => Err(recovery_error(format!(
            "signed for chain {} but network is {}",
            chain_id, network_id
        ))),
        _ => Ok(sender),
    }
}

#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    endpoint: String,
    timeout_seconds: u64,
}

impl RpcClient {
    pub fn new(endpoint: String, timeout_seconds: u64) -> Result<Self, RpcError> {
        let context = LogContext::new("rpc_client", "initialization")
            .with_metadata("endpoint", json!(endpoint))
            .with_metadata("timeout_seconds", json!(timeout_seconds));
        context.info("Initializing RPC client");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            timeout_seconds,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn make_request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let monitor = PerformanceMonitor::new("rpc_request").with_metadata("method", json!(method));
        let result = self.send_request(method, params).await;
        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_rpc_call(method, duration, result.is_ok());
        result
    }

    async fn send_request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        LogContext::new("rpc_client", "make_request")
            .with_metadata("method", json!(method))
            .trace(&format!("Sending RPC request: {}", method));

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout {
                        seconds: self.timeout_seconds,
                    }
                } else if e.is_connect() {
                    RpcError::Connection(e.to_string())
                } else {
                    RpcError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let rpc_response: JsonRpcResponse = serde_json::from_str(&body)?;

        if let Some(error) = rpc_response.error {
            return Err(RpcError::Method {
                code: error.code,
                message: error.message,
            });
        }

        // A JSON null result is meaningful (e.g. unknown block)
        Ok(rpc_response.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn latest_height(&self) -> Result<u64, RpcError> {
        let result = self.make_request("eth_blockNumber", vec![]).await?;

        let hex_string = result
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("Block number is not a string".to_string()))?;

        let height = parse_hex_to_u64(hex_string)
            .map_err(|e| RpcError::InvalidResponse(format!("Failed to parse block number: {}", e)))?;

        LogContext::new("rpc_client", "latest_height")
            .with_block_number(height)
            .debug(&format!("Retrieved latest block number: {}", height));

        Ok(height)
    }

    async fn block_by_number(&self, block_number: u64) -> Result<Block, RpcError> {
        let params = vec![
            Value::String(format!("0x{:x}", block_number)),
            Value::Bool(true), // full transaction objects
        ];

        let result = self.make_request("eth_getBlockByNumber", params).await?;
        if result.is_null() {
            return Err(RpcError::BlockNotFound { block_number });
        }

        let raw: RawBlock = serde_json::from_value(result)?;
        let block = Block::try_from(raw)?;

        LogContext::new("rpc_client", "block_by_number")
            .with_block_number(block_number)
            .with_metadata("transaction_count", json!(block.transactions.len()))
            .debug(&format!(
                "Retrieved block {} with {} transactions",
                block_number,
                block.transactions.len()
            ));

        Ok(block)
    }

    async fn network_id(&self) -> Result<u64, RpcError> {
        let result = self.make_request("net_version", vec![]).await?;

        let raw = result
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("Network id is not a string".to_string()))?;

        let parsed = if raw.starts_with("0x") {
            parse_hex_to_u64(raw).ok()
        } else {
            raw.parse::<u64>().ok()
        };

        parsed.ok_or_else(|| RpcError::InvalidResponse(format!("Invalid network id: {}", raw)))
    }
}

/// Parse a hex quantity such as `0x1b4`; `0x` alone is zero
pub fn parse_hex_to_u64(hex_str: &str) -> Result<u64, ValidationError> {
    let digits = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| ValidationError::InvalidQuantity(format!("{}: {}", hex_str, e)))
}

/// Convert a 256-bit hex quantity to its decimal string
pub fn hex_quantity_to_decimal(hex_str: &str) -> Result<String, ValidationError> {
    let digits = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    if digits.is_empty() {
        return Ok("0".to_string());
    }
    U256::from_str_radix(digits, 16)
        .map(|value| value.to_string())
        .map_err(|_| ValidationError::InvalidQuantity(hex_str.to_string()))
}
