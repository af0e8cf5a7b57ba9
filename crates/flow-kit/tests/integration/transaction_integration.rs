//! Building, signing and submitting transactions against the mock node.

use std::future::IntoFuture;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flow_kit::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::mock_node::{ALICE, BLOCK_ID, MockNode, alice, key_json, result_json};

const TRANSFER: &str = r#"
import FungibleToken from 0xf233dcee88fe0abe

transaction(amount: UFix64, to: Address) {
    prepare(signer: auth(BorrowValue) &Account) {}
    execute {}
}
"#;

const BOB: &str = "0x25f823e2a115b2dc";

#[tokio::test]
async fn test_single_signer_transfer_seals() {
    let node = MockNode::start().await;
    node.account(ALICE, "100000000", vec![key_json(&alice(), 7)])
        .await;
    node.latest_block().await;
    node.accept_transactions().await;

    let payload = json!({
        "type": "Event",
        "value": {
            "id": "A.1654653399040a61.FlowToken.TokensDeposited",
            "fields": [
                {"name": "amount", "value": {"type": "UFix64", "value": "1.50000000"}},
                {"name": "to", "value": {"type": "Optional", "value": {"type": "Address", "value": BOB}}}
            ]
        }
    });
    let mut sealed = result_json("Sealed");
    sealed["events"] = json!([{
        "type": "A.1654653399040a61.FlowToken.TokensDeposited",
        "transaction_id": "",
        "transaction_index": "0",
        "event_index": "0",
        "payload": STANDARD.encode(payload.to_string())
    }]);
    node.results(vec![
        result_json("Pending"),
        result_json("Finalized"),
        result_json("Executed"),
        sealed,
    ])
    .await;

    let flow = node.flow().signer(alice()).build();
    let submission = flow
        .transaction(TRANSFER)
        .argument(Argument::ufix64("1.5").unwrap())
        .argument(BOB.parse::<Address>().unwrap())
        .send()
        .await
        .unwrap();

    assert_eq!(submission.status, SubmissionStatus::Sealed);
    assert!(submission.is_success());
    assert!(submission.error_message.is_empty());
    assert_eq!(submission.events.len(), 1);
    assert_eq!(
        submission.events[0].field("amount").unwrap()["value"],
        "1.50000000"
    );
    assert_eq!(
        submission.explorer_url,
        format!("http://localhost:8888/v1/transactions/{}", submission.transaction_id)
    );

    let bodies = node.submitted().await;
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body.proposal_key.sequence_number, 7);
    assert_eq!(body.proposal_key.key_index, 0);
    assert_eq!(body.reference_block_id.to_string(), BLOCK_ID);
    assert_eq!(body.gas_limit, 9999);
    assert_eq!(body.authorizers, vec![ALICE.parse::<Address>().unwrap()]);
    // One party: the payer signs the envelope only.
    assert!(body.payload_signatures.is_empty());
    assert_eq!(body.envelope_signatures.len(), 1);
    assert_eq!(body.envelope_signatures[0].signature.len(), 64);

    let envelope = SignedEnvelope::from_request(body).unwrap();
    assert_eq!(envelope.transaction_id(), submission.transaction_id);
    let account = flow.account(ALICE).await.unwrap();
    envelope.verify_signatures(&[account]).unwrap();
}

#[tokio::test]
async fn test_algorithm_mismatch_is_not_submitted() {
    let node = MockNode::start().await;
    let mut key = key_json(&alice(), 0);
    key["signing_algorithm"] = json!("ECDSA_secp256k1");
    node.account(ALICE, "100000000", vec![key]).await;
    node.latest_block().await;
    Mock::given(method("POST"))
        .and(path("/v1/transactions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&node.server)
        .await;

    let flow = node.flow().signer(alice()).build();
    let err = flow
        .transaction("transaction { prepare(signer: &Account) {} }")
        .send()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    let message = err.to_string();
    assert!(message.contains("(ECDSA_P256, SHA3_256)"), "{message}");
    assert!(message.contains("(ECDSA_secp256k1, SHA3_256)"), "{message}");
}

#[tokio::test]
async fn test_argument_mismatch_fails_before_submission() {
    let node = MockNode::start().await;
    node.account(ALICE, "100000000", vec![key_json(&alice(), 0)])
        .await;
    node.latest_block().await;
    let flow = node.flow().signer(alice()).build();

    let err = flow
        .transaction(TRANSFER)
        .argument(Argument::string("1.5"))
        .argument(BOB.parse::<Address>().unwrap())
        .send()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::ArgumentType { index: 0, .. })
    ));
    assert!(node.submitted().await.is_empty());
}

#[tokio::test]
async fn test_insufficient_key_weight() {
    let node = MockNode::start().await;
    let mut key = key_json(&alice(), 0);
    key["weight"] = json!("500");
    node.account(ALICE, "100000000", vec![key]).await;
    node.latest_block().await;
    let flow = node.flow().signer(alice()).build();

    let err = flow
        .transaction("transaction { prepare() {} }")
        .send()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::InsufficientWeight { weight: 500, .. })
    ));
}

#[tokio::test]
async fn test_sign_offline_then_submit_and_wait() {
    let node = MockNode::start().await;
    node.account(ALICE, "100000000", vec![key_json(&alice(), 3)])
        .await;
    node.accept_transactions().await;
    node.results(vec![result_json("Executed"), result_json("Sealed")])
        .await;
    let flow = node.flow().signer(alice()).build();

    let block: Identifier = BLOCK_ID.parse().unwrap();
    let envelope = flow
        .transaction("transaction { prepare(signer: &Account) {} }")
        .reference_block(block)
        .gas_limit(100)
        .sign()
        .await
        .unwrap();
    assert_eq!(envelope.transaction().reference_block_id(), block);
    assert_eq!(envelope.transaction().gas_limit(), 100);
    assert_eq!(envelope.transaction().proposal_key().sequence_number, 3);

    let submission = flow.submit(&envelope).await.unwrap();
    assert_eq!(submission.status, SubmissionStatus::Submitted);
    assert_eq!(submission.transaction_id, envelope.transaction_id());

    let sealed = flow.wait_for(submission).await.unwrap();
    assert!(sealed.is_success());
}

#[tokio::test]
async fn test_two_party_transaction() {
    let node = MockNode::start().await;
    let bob = InMemorySigner::new(
        BOB,
        2,
        "1f3c6a8e2b4d9f7015a3c8e6b2d4f9a7c5e1b3d8f6a4c2e9b7d5f3a1c8e6b4d2",
        SignatureAlgorithm::EcdsaSecp256k1,
        HashAlgorithm::Sha2_256,
    )
    .unwrap();
    node.account(ALICE, "100000000", vec![key_json(&alice(), 11)])
        .await;
    node.account(BOB, "100000000", vec![key_json(&bob, 0)]).await;
    node.latest_block().await;
    node.accept_transactions().await;
    node.results(vec![result_json("Sealed")]).await;

    let flow = node.flow().build();
    let submission = flow
        .transaction("transaction { prepare(a: &Account, b: &Account) {} }")
        .sign_with(alice())
        .sign_with(bob)
        .payer(BOB)
        .authorizer(ALICE)
        .authorizer(BOB)
        .send()
        .await
        .unwrap();
    assert!(submission.is_success());

    let body = &node.submitted().await[0];
    assert_eq!(body.payer, BOB.parse::<Address>().unwrap());
    assert_eq!(body.proposal_key.sequence_number, 11);
    assert_eq!(body.payload_signatures.len(), 1);
    assert_eq!(body.payload_signatures[0].address, ALICE.parse::<Address>().unwrap());
    assert_eq!(body.envelope_signatures.len(), 1);
    assert_eq!(body.envelope_signatures[0].address, BOB.parse::<Address>().unwrap());
    assert_eq!(body.envelope_signatures[0].key_index, 2);
}

#[tokio::test]
async fn test_concurrent_submissions_from_one_key_are_serialized() {
    let node = MockNode::start().await;
    let accepted = Arc::new(AtomicU64::new(0));
    node.account_tracking(&alice(), accepted.clone()).await;
    node.latest_block().await;
    node.accept_transactions_counting(accepted.clone()).await;
    node.results(vec![result_json("Sealed")]).await;

    let flow = node.flow().signer(alice()).serialize_per_key(true).build();
    let first = flow.transaction("transaction { prepare() {} }").send();
    let second = flow.transaction("transaction { prepare() {} }").send();
    let (first, second) = tokio::join!(first.into_future(), second.into_future());
    assert!(first.unwrap().is_success());
    assert!(second.unwrap().is_success());

    let mut sequence_numbers: Vec<u64> = node
        .submitted()
        .await
        .iter()
        .map(|b| b.proposal_key.sequence_number)
        .collect();
    sequence_numbers.sort();
    assert_eq!(sequence_numbers, vec![0, 1]);
}
