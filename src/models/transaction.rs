use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A transaction touching a watched address, in the analyzer's wire shape
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchedTransaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    /// Decimal wei
    pub value: String,
    pub gas: u64,
    /// Decimal wei, "0" when the node omits it
    #[serde(rename = "gasPrice")]
    pub gas_price: String,
    #[serde(rename = "blockNum")]
    pub block_num: u64,
    pub timestamp: u64,
    /// Call data as hex, without the `0x` prefix
    pub input: String,
}

/// Opaque analyzer response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AnalyzerVerdict(pub Value);

impl AnalyzerVerdict {
    pub fn into_inner(self) -> Value {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> MatchedTransaction {
        MatchedTransaction {
            hash: "0xabc123".to_string(),
            from: "0xaa00000000000000000000000000000000000001".to_string(),
            to: "0x0000000000000000000000000000000000000000".to_string(),
            value: "1000000000000000000".to_string(),
            gas: 21000,
            gas_price: "0".to_string(),
            block_num: 12345,
            timestamp: 1640995200,
            input: "a9059cbb".to_string(),
        }
    }

    #[test]
    fn test_matched_transaction_wire_keys() {
        let value = serde_json::to_value(sample()).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["blockNum", "from", "gas", "gasPrice", "hash", "input", "timestamp", "to", "value"]
        );
        assert_eq!(value["blockNum"], json!(12345));
        assert_eq!(value["value"], json!("1000000000000000000"));
    }

    #[test]
    fn test_verdict_is_transparent() {
        let verdict: AnalyzerVerdict =
            serde_json::from_str(r#"{"risk_score":0.87,"label":"suspicious"}"#).unwrap();
        assert_eq!(verdict.0["label"], "suspicious");
        assert_eq!(
            serde_json::to_string(&verdict).unwrap(),
            serde_json::to_string(&verdict.clone().into_inner()).unwrap()
        );
    }
}
