//! Submission lifecycle: expiry, failure, deadlines and cancellation.

use std::time::{Duration, Instant};

use flow_kit::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::mock_node::{ALICE, MockNode, alice, key_json, result_json};

const NOOP: &str = "transaction { prepare(signer: &Account) {} }";

async fn node_with_alice() -> MockNode {
    let node = MockNode::start().await;
    node.account(ALICE, "100000000", vec![key_json(&alice(), 0)])
        .await;
    node
}

fn rejection(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({"code": 400, "message": message}))
}

// =============================================================================
// Expiry
// =============================================================================

#[tokio::test]
async fn test_expired_reference_block_is_retried() {
    let node = node_with_alice().await;
    Mock::given(method("GET"))
        .and(path("/v1/blocks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"header": {"id": "1111111111111111111111111111111111111111111111111111111111111111", "height": "1"}}
        ])))
        // A fresh block for the first attempt and for the retry.
        .expect(2)
        .mount(&node.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/transactions"))
        .respond_with(rejection(
            "invalid reference block: transaction is expired",
        ))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&node.server)
        .await;
    node.accept_transactions().await;
    node.results(vec![result_json("Sealed")]).await;

    let flow = node.flow().signer(alice()).build();
    let submission = flow.transaction(NOOP).send().await.unwrap();
    assert!(submission.is_success());
    assert_eq!(node.submitted().await.len(), 2);
}

#[tokio::test]
async fn test_expiry_retries_are_bounded() {
    let node = node_with_alice().await;
    node.latest_block().await;
    Mock::given(method("POST"))
        .and(path("/v1/transactions"))
        .respond_with(rejection("transaction is expired"))
        .expect(3)
        .mount(&node.server)
        .await;

    let flow = node.flow().signer(alice()).build();
    let err = flow.transaction(NOOP).send().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Expired);
    assert!(err.is_expired());
}

#[tokio::test]
async fn test_expired_status_without_retries() {
    let node = node_with_alice().await;
    node.latest_block().await;
    node.accept_transactions().await;
    node.results(vec![result_json("Pending"), result_json("Expired")])
        .await;

    let flow = node.flow().signer(alice()).max_expiry_retries(0).build();
    let err = flow.transaction(NOOP).send().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Expired);
    assert!(err.transaction_id().is_some());
    assert!(
        err.explorer_url()
            .unwrap()
            .starts_with("http://localhost:8888/v1/transactions/")
    );
}

// =============================================================================
// Node rejections and failures
// =============================================================================

#[tokio::test]
async fn test_execution_failure() {
    let node = node_with_alice().await;
    node.latest_block().await;
    node.accept_transactions().await;
    let mut failed = result_json("Sealed");
    failed["status_code"] = json!(1);
    failed["error_message"] =
        json!("[Error Code: 1101] cadence runtime error: pre-condition failed");
    node.results(vec![result_json("Executed"), failed]).await;

    let flow = node.flow().signer(alice()).build();
    let err = flow.transaction(NOOP).send().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    match &err {
        Error::Execution(submission) => {
            assert_eq!(submission.status, SubmissionStatus::Failed);
            assert!(submission.error_message.contains("pre-condition failed"));
            assert!(!submission.is_success());
        }
        other => panic!("expected an execution error, got {other:?}"),
    }
    assert!(err.explorer_url().is_some());
    // Runtime failures are never resubmitted.
    assert_eq!(node.submitted().await.len(), 1);
}

#[tokio::test]
async fn test_signature_rejection_is_not_retried() {
    let node = node_with_alice().await;
    node.latest_block().await;
    Mock::given(method("POST"))
        .and(path("/v1/transactions"))
        .respond_with(rejection(
            "invalid signature: payload signature could not be verified",
        ))
        .expect(1)
        .mount(&node.server)
        .await;

    let flow = node.flow().signer(alice()).build();
    let err = flow.transaction(NOOP).send().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureInvalid);
    assert!(err.transaction_id().is_some());
}

#[tokio::test]
async fn test_id_mismatch_is_protocol_error() {
    let node = node_with_alice().await;
    node.latest_block().await;
    Mock::given(method("POST"))
        .and(path("/v1/transactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "0000000000000000000000000000000000000000000000000000000000000000"
        })))
        .mount(&node.server)
        .await;

    let flow = node.flow().signer(alice()).build();
    let err = flow.transaction(NOOP).send().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.to_string().contains("node assigned transaction id"));
}

// =============================================================================
// Deadlines and cancellation
// =============================================================================

#[tokio::test]
async fn test_deadline_reports_last_status() {
    let node = node_with_alice().await;
    node.latest_block().await;
    node.accept_transactions().await;
    node.results(vec![result_json("Finalized")]).await;

    let flow = node.flow().signer(alice()).build();
    let started = Instant::now();
    let err = flow
        .transaction(NOOP)
        .send()
        .deadline(Duration::from_millis(300))
        .await
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(err.kind(), ErrorKind::Timeout);
    match &err {
        Error::Timeout { last_status, .. } => {
            assert_eq!(*last_status, Some(SubmissionStatus::Finalized));
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert!(err.to_string().contains("last status: FINALIZED"));
    assert!(err.explorer_url().is_some());
}

#[tokio::test]
async fn test_zero_poll_interval_still_backs_off() {
    let node = node_with_alice().await;
    node.latest_block().await;
    node.accept_transactions().await;
    node.results(vec![result_json("Pending")]).await;

    let flow = node
        .flow()
        .signer(alice())
        .poll_config(PollConfig {
            initial_interval_ms: 0,
            max_interval_ms: 8000,
        })
        .build();
    let err = flow
        .transaction(NOOP)
        .send()
        .deadline(Duration::from_millis(500))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);

    // 1 ms doubling: about ten polls fit in the deadline.
    let polls = node
        .server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with("/v1/transaction_results/"))
        .count();
    assert!(polls <= 15, "{polls} result polls in 500ms");
}

#[tokio::test]
async fn test_cancellation_aborts_polling() {
    let node = node_with_alice().await;
    node.latest_block().await;
    node.accept_transactions().await;
    node.results(vec![result_json("Pending")]).await;

    let flow = node.flow().signer(alice()).build();
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = flow
        .transaction(NOOP)
        .cancel_token(token)
        .send()
        .await
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    // The node had already accepted the transaction.
    assert!(err.transaction_id().is_some());
}

// =============================================================================
// Refresh
// =============================================================================

#[tokio::test]
async fn test_refresh_is_idempotent_once_terminal() {
    let node = node_with_alice().await;
    node.latest_block().await;
    node.accept_transactions().await;
    node.results(vec![result_json("Executed"), result_json("Sealed")])
        .await;

    let flow = node.flow().signer(alice()).build();
    let envelope = flow.transaction(NOOP).sign().await.unwrap();
    let mut submission = flow.submit(&envelope).await.unwrap();

    assert!(flow.refresh(&mut submission).await.unwrap());
    assert_eq!(submission.status, SubmissionStatus::Executed);
    assert!(flow.refresh(&mut submission).await.unwrap());
    assert_eq!(submission.status, SubmissionStatus::Sealed);

    let before = submission.clone();
    assert!(!flow.refresh(&mut submission).await.unwrap());
    assert_eq!(submission, before);
}
