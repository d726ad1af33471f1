use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wallet_risk_scanner::blockchain::{ChainClient, RpcClient};
use wallet_risk_scanner::error::RpcError;

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result
    }))
}

async fn client_for(server: &MockServer) -> RpcClient {
    RpcClient::new(server.uri(), 5).unwrap()
}

#[tokio::test]
async fn test_latest_height() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({"method": "eth_blockNumber"})))
        .respond_with(rpc_result(json!("0x1388")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert_eq!(client.latest_height().await.unwrap(), 5000);
}

#[tokio::test]
async fn test_block_by_number_with_transactions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_getBlockByNumber",
            "params": ["0x65", true]
        })))
        .respond_with(rpc_result(json!({
            "number": "0x65",
            "timestamp": "0x6553f100",
            "transactions": [{
                "hash": "0xabc",
                "from": "0xAA00000000000000000000000000000000000001",
                "to": null,
                "value": "0xde0b6b3a7640000",
                "gas": "0x5208",
                "gasPrice": "0x6fc23ac00",
                "input": "0x",
                "v": "0x135"
            }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let block = client.block_by_number(101).await.unwrap();

    assert_eq!(block.number, 101);
    assert_eq!(block.timestamp, 1_700_000_000);
    assert_eq!(block.transactions.len(), 1);

    let tx = &block.transactions[0];
    assert_eq!(tx.hash, "0xabc");
    assert!(tx.to.is_none());
    assert_eq!(tx.gas_price.as_deref(), Some("0x6fc23ac00"));
    assert_eq!(
        client.sender_recovery(tx, 137).unwrap(),
        "0xaa00000000000000000000000000000000000001"
    );
}

#[tokio::test]
async fn test_missing_block_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getBlockByNumber"})))
        .respond_with(rpc_result(serde_json::Value::Null))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let result = client.block_by_number(999_999).await;
    assert!(matches!(result, Err(RpcError::BlockNotFound { block_number: 999_999 })));
}

#[tokio::test]
async fn test_node_error_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "header not found"}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    match client.latest_height().await {
        Err(RpcError::Method { code, message }) => {
            assert_eq!(code, -32000);
            assert_eq!(message, "header not found");
        }
        other => panic!("expected method error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_failure_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let result = client.latest_height().await;
    assert!(matches!(result, Err(RpcError::HttpStatus { status: 500 })));
}

#[tokio::test]
async fn test_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert!(matches!(client.latest_height().await, Err(RpcError::Json(_))));
}

#[tokio::test]
async fn test_network_id_decimal_and_hex() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "net_version"})))
        .respond_with(rpc_result(json!("137")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "net_version"})))
        .respond_with(rpc_result(json!("0x13881")))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert_eq!(client.network_id().await.unwrap(), 137);
    assert_eq!(client.network_id().await.unwrap(), 80001);
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    // Nothing listens on the discard port
    let client = RpcClient::new("http://127.0.0.1:9".to_string(), 2).unwrap();
    let result = client.latest_height().await;
    assert!(matches!(
        result,
        Err(RpcError::Connection(_)) | Err(RpcError::Timeout { .. }) | Err(RpcError::Http(_))
    ));
}
