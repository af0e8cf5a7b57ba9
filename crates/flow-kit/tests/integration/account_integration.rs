//! Account and block reads against the mock node.

use std::time::{Duration, Instant};

use flow_kit::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::mock_node::{ALICE, BLOCK_ID, MockNode, alice, key_json};

#[tokio::test]
async fn test_balance_lookup() {
    let node = MockNode::start().await;
    node.account(ALICE, "1050000000", vec![key_json(&alice(), 0)])
        .await;
    let flow = node.flow().build();

    let balance = flow.balance(ALICE).await.unwrap();
    assert_eq!(balance.raw(), 1_050_000_000);
    assert_eq!(balance.to_token_string(), "10.5 FLOW");
    // Formatting leaves the value alone.
    assert_eq!(balance.raw(), 1_050_000_000);
}

#[tokio::test]
async fn test_account_keys_in_node_order() {
    let node = MockNode::start().await;
    let mut second = key_json(&alice(), 9);
    second["index"] = json!("5");
    node.account(ALICE, "0", vec![second, key_json(&alice(), 2)])
        .await;
    let flow = node.flow().build();

    // Unprefixed addresses are accepted.
    let account = flow.account("36395f9dde50ea27").await.unwrap();
    let indices: Vec<u32> = account.keys.iter().map(|k| k.index).collect();
    assert_eq!(indices, vec![5, 0]);
    assert_eq!(account.key(0).unwrap().sequence_number, 2);
    assert_eq!(account.key(5).unwrap().sequence_number, 9);
    assert!(account.key(1).is_none());
}

#[tokio::test]
async fn test_account_not_found() {
    let node = MockNode::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/accounts/0000000000000001"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"code": 404, "message": "account not found"})),
        )
        .mount(&node.server)
        .await;
    let flow = node.flow().build();

    let err = flow.account("0x0000000000000001").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        err.to_string(),
        "Account 0x0000000000000001 not found on emulator"
    );
}

#[tokio::test]
async fn test_malformed_account_is_protocol_error() {
    let node = MockNode::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/accounts/36395f9dde50ea27"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"address": ALICE})))
        .mount(&node.server)
        .await;
    let flow = node.flow().build();

    let err = flow.account(ALICE).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[tokio::test]
async fn test_server_error_is_retried_then_reported() {
    let node = MockNode::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/accounts/36395f9dde50ea27"))
        .respond_with(ResponseTemplate::new(503))
        // One attempt plus one retry.
        .expect(2)
        .mount(&node.server)
        .await;
    let flow = node.flow().build();

    let err = flow.account(ALICE).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    match err {
        Error::Rest(e) => assert_eq!(e.status_code(), Some(503)),
        other => panic!("expected a REST error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_timeout_bounds_retries() {
    let node = MockNode::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/accounts/36395f9dde50ea27"))
        .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_millis(150)))
        .mount(&node.server)
        .await;
    let flow = node
        .flow()
        .retry_config(RetryConfig {
            max_retries: 10,
            initial_delay_ms: 5,
            max_delay_ms: 10,
        })
        .request_timeout(Duration::from_millis(400))
        .build();

    // Each attempt answers in time; the retries together do not.
    let started = Instant::now();
    let err = flow.balance(ALICE).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_latest_block() {
    let node = MockNode::start().await;
    node.latest_block().await;
    let flow = node.flow().build();

    let block = flow.latest_block().await.unwrap();
    assert_eq!(block.id.to_string(), BLOCK_ID);
    assert_eq!(block.height, 42);
}

#[tokio::test]
async fn test_transaction_result_not_found() {
    let node = MockNode::start().await;
    let flow = node.flow().build();

    let err = flow
        .transaction_result(BLOCK_ID)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(matches!(
        err,
        Error::TransactionNotFound {
            network: Network::Emulator,
            ..
        }
    ));
}
