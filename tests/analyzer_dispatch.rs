use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wallet_risk_scanner::analyzer::{AnalyzerClient, TransactionDispatcher};
use wallet_risk_scanner::error::AnalyzerError;
use wallet_risk_scanner::models::MatchedTransaction;

fn matched() -> MatchedTransaction {
    MatchedTransaction {
        hash: "0xabc".to_string(),
        from: "0xaa00000000000000000000000000000000000001".to_string(),
        to: "0x0000000000000000000000000000000000000000".to_string(),
        value: "1000000000000000000".to_string(),
        gas: 21000,
        gas_price: "30000000000".to_string(),
        block_num: 101,
        timestamp: 1_700_000_000,
        input: "a9059cbb".to_string(),
    }
}

#[tokio::test]
async fn test_dispatch_posts_payload_and_returns_verdict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "hash": "0xabc",
            "from": "0xaa00000000000000000000000000000000000001",
            "to": "0x0000000000000000000000000000000000000000",
            "value": "1000000000000000000",
            "gas": 21000,
            "gasPrice": "30000000000",
            "blockNum": 101,
            "timestamp": 1_700_000_000u64,
            "input": "a9059cbb"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "risk_score": 0.92,
            "labels": ["mixer"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnalyzerClient::new(&format!("{}/", server.uri()), 5).unwrap();
    let verdict = client.dispatch(&matched()).await.unwrap();

    assert_eq!(verdict.into_inner()["labels"][0], "mixer");
}

#[tokio::test]
async fn test_non_ok_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnalyzerClient::new(&server.uri(), 5).unwrap();
    match client.dispatch(&matched()).await {
        Err(AnalyzerError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "model loading");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_other_success_codes_are_not_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"queued": true})))
        .mount(&server)
        .await;

    let client = AnalyzerClient::new(&server.uri(), 5).unwrap();
    let result = client.dispatch(&matched()).await;
    assert!(matches!(result, Err(AnalyzerError::Status { status: 202, .. })));
}

#[tokio::test]
async fn test_undecodable_verdict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let client = AnalyzerClient::new(&server.uri(), 5).unwrap();
    assert!(matches!(client.dispatch(&matched()).await, Err(AnalyzerError::Decode(_))));
}
