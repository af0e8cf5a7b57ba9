//! A wiremock stand-in for a Flow Access node.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use flow_kit::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const ALICE: &str = "0x36395f9dde50ea27";
pub const ALICE_KEY: &str = "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721";
pub const BLOCK_ID: &str = "7bc42fe85d32ca513769a74f97f7e1a7bad6c9407f0d934c2aa645ef9cf613c7";

pub fn alice() -> InMemorySigner {
    InMemorySigner::new(
        ALICE,
        0,
        ALICE_KEY,
        SignatureAlgorithm::EcdsaP256,
        HashAlgorithm::Sha3_256,
    )
    .unwrap()
}

pub fn key_json(signer: &InMemorySigner, sequence_number: u64) -> Value {
    json!({
        "index": signer.key_index().to_string(),
        "public_key": signer.public_key().to_hex(),
        "signing_algorithm": signer.signature_algorithm().as_str(),
        "hashing_algorithm": signer.hash_algorithm().as_str(),
        "sequence_number": sequence_number.to_string(),
        "weight": "1000",
        "revoked": false
    })
}

pub fn result_json(status: &str) -> Value {
    json!({
        "block_id": "",
        "status": status,
        "status_code": 0,
        "error_message": "",
        "events": []
    })
}

/// The id a node would assign to a submitted body.
fn echo_id(request: &Request) -> ResponseTemplate {
    let body: TransactionRequest = match serde_json::from_slice(&request.body) {
        Ok(body) => body,
        Err(e) => {
            return ResponseTemplate::new(400)
                .set_body_json(json!({"code": 400, "message": e.to_string()}));
        }
    };
    match SignedEnvelope::from_request(&body) {
        Ok(envelope) => ResponseTemplate::new(200)
            .set_body_json(json!({"id": envelope.transaction_id().to_string()})),
        Err(e) => ResponseTemplate::new(400)
            .set_body_json(json!({"code": 400, "message": e.to_string()})),
    }
}

/// Log to the test writer; filter with `RUST_LOG=flow_kit=debug`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct MockNode {
    pub server: MockServer,
}

impl MockNode {
    pub async fn start() -> Self {
        init_tracing();
        Self {
            server: MockServer::start().await,
        }
    }

    /// A client pointed at the mock with fast polling.
    pub fn flow(&self) -> FlowBuilder {
        Flow::emulator()
            .rest_url(self.server.uri())
            .poll_config(PollConfig {
                initial_interval_ms: 10,
                max_interval_ms: 40,
            })
            .retry_config(RetryConfig {
                max_retries: 1,
                initial_delay_ms: 5,
                max_delay_ms: 10,
            })
            .request_timeout(Duration::from_secs(2))
            .deadline(Duration::from_secs(5))
    }

    pub async fn account(&self, address: &str, balance: &str, keys: Vec<Value>) {
        let hex = address.trim_start_matches("0x").to_string();
        Mock::given(method("GET"))
            .and(path(format!("/v1/accounts/{hex}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "address": address,
                "balance": balance,
                "keys": keys,
                "contracts": {}
            })))
            .mount(&self.server)
            .await;
    }

    /// An account whose key sequence number equals the number of
    /// transactions the node has accepted so far.
    pub async fn account_tracking(&self, signer: &InMemorySigner, accepted: Arc<AtomicU64>) {
        let hex = signer.address().to_hex();
        let signer = signer.clone();
        Mock::given(method("GET"))
            .and(path(format!("/v1/accounts/{hex}")))
            .respond_with(move |_: &Request| {
                let sequence_number = accepted.load(Ordering::SeqCst);
                ResponseTemplate::new(200).set_body_json(json!({
                    "address": signer.address().to_string(),
                    "balance": "100000000",
                    "keys": [key_json(&signer, sequence_number)]
                }))
            })
            .mount(&self.server)
            .await;
    }

    pub async fn latest_block(&self) {
        Mock::given(method("GET"))
            .and(path("/v1/blocks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"header": {"id": BLOCK_ID, "height": "42", "timestamp": "2024-01-01T00:00:00Z"}}
            ])))
            .mount(&self.server)
            .await;
    }

    /// Accept every well-formed submission, answering with its real id.
    pub async fn accept_transactions(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/transactions"))
            .respond_with(echo_id)
            .mount(&self.server)
            .await;
    }

    /// Accept submissions and count them.
    pub async fn accept_transactions_counting(&self, accepted: Arc<AtomicU64>) {
        Mock::given(method("POST"))
            .and(path("/v1/transactions"))
            .respond_with(move |request: &Request| {
                accepted.fetch_add(1, Ordering::SeqCst);
                echo_id(request)
            })
            .mount(&self.server)
            .await;
    }

    /// Answer result polls with `results` in order, repeating the last one.
    pub async fn results(&self, results: Vec<Value>) {
        let polls = Arc::new(AtomicUsize::new(0));
        Mock::given(method("GET"))
            .and(path_regex(r"^/v1/transaction_results/[0-9a-f]{64}$"))
            .respond_with(move |_: &Request| {
                let n = polls.fetch_add(1, Ordering::SeqCst);
                let body = results[n.min(results.len() - 1)].clone();
                ResponseTemplate::new(200).set_body_json(body)
            })
            .mount(&self.server)
            .await;
    }

    /// Bodies of every accepted or rejected submission, in order.
    pub async fn submitted(&self) -> Vec<TransactionRequest> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "POST")
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }
}
