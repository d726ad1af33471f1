use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;

use crate::error::AnalyzerError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{AnalyzerVerdict, MatchedTransaction};

/// Delivers matched transactions for risk analysis
#[async_trait]
pub trait TransactionDispatcher: Send + Sync {
    async fn dispatch(&self, tx: &MatchedTransaction) -> Result<AnalyzerVerdict, AnalyzerError>;
}

/// HTTP client for the risk analyzer's `/analyze` endpoint
#[derive(Clone)]
pub struct AnalyzerClient {
    client: Client,
    analyze_url: String,
}

impl AnalyzerClient {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, AnalyzerError> {
        let analyze_url = format!("{}/analyze", base_url.trim_end_matches('/'));

        LogContext::new("analyzer", "initialization")
            .with_metadata("url", json!(analyze_url))
            .info("Initializing analyzer client");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self { client, analyze_url })
    }

    pub fn analyze_url(&self) -> &str {
        &self.analyze_url
    }

    async fn post(&self, tx: &MatchedTransaction) -> Result<AnalyzerVerdict, AnalyzerError> {
        let response = self.client.post(&self.analyze_url).json(tx).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(AnalyzerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| AnalyzerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TransactionDispatcher for AnalyzerClient {
    async fn dispatch(&self, tx: &MatchedTransaction) -> Result<AnalyzerVerdict, AnalyzerError> {
        let monitor = PerformanceMonitor::new("analyzer_dispatch")
            .with_metadata("transaction_hash", json!(tx.hash));

        let result = self.post(tx).await;
        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_dispatch(&tx.hash, duration, result.is_ok());

        if let Ok(verdict) = &result {
            LogContext::new("analyzer", "verdict")
                .with_transaction_hash(&tx.hash)
                .with_block_number(tx.block_num)
                .with_metadata("verdict", verdict.0.clone())
                .info("Risk analysis");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_url_joins_base() {
        let client = AnalyzerClient::new("http://analyzer:9000/", 5).unwrap();
        assert_eq!(client.analyze_url(), "http://analyzer:9000/analyze");

        let client = AnalyzerClient::new("http://analyzer:9000", 5).unwrap();
        assert_eq!(client.analyze_url(), "http://analyzer:9000/analyze");
    }
}
