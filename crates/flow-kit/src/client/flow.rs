//! The main Flow client.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, Error, RestError, ValidationError};
use crate::types::{
    Block, HashAlgorithm, Identifier, Network, SignatureAlgorithm, SignedEnvelope, Submission,
    TransactionResult,
};

use super::config::{ClientConfig, PollConfig};
use super::key_lock::KeyLocks;
use super::query::{AccountQuery, BalanceQuery};
use super::rest::{RestClient, RetryConfig};
use super::signer::{InMemorySigner, Signer};
use super::submission::{SealWait, refresh_once, submit_envelope};
use super::transaction::TransactionBuilder;

/// The main client for a Flow Access node.
///
/// The client can be used without a signer for reads, or with a default
/// signer for transactions. Cloning is cheap; clones share the HTTP
/// connection pool and the per-key locks.
///
/// # Example
///
/// ```rust,no_run
/// use flow_kit::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), flow_kit::Error> {
///     // Read-only client
///     let flow = Flow::testnet().build();
///     let balance = flow.balance("0x36395f9dde50ea27").await?;
///     println!("Balance: {}", balance.to_token_string());
///
///     // Client with a signer
///     let flow = Flow::testnet()
///         .credentials(
///             "0x36395f9dde50ea27",
///             0,
///             "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721",
///             SignatureAlgorithm::EcdsaP256,
///             HashAlgorithm::Sha3_256,
///         )?
///         .build();
///     let sealed = flow.transaction("transaction { prepare() {} }").send().await?;
///     println!("Sealed: {}", sealed.explorer_url);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Flow {
    rest: Arc<RestClient>,
    signer: Option<Arc<dyn Signer>>,
    config: ClientConfig,
    key_locks: Arc<KeyLocks>,
}

impl Flow {
    /// Create a builder for mainnet.
    pub fn mainnet() -> FlowBuilder {
        FlowBuilder::new(ClientConfig::for_network(Network::Mainnet))
    }

    /// Create a builder for testnet.
    pub fn testnet() -> FlowBuilder {
        FlowBuilder::new(ClientConfig::for_network(Network::Testnet))
    }

    /// Create a builder for a local emulator.
    pub fn emulator() -> FlowBuilder {
        FlowBuilder::new(ClientConfig::for_network(Network::Emulator))
    }

    /// Create a builder for a network.
    pub fn builder(network: Network) -> FlowBuilder {
        FlowBuilder::new(ClientConfig::for_network(network))
    }

    /// Create a builder from a full configuration record.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable (see
    /// [`ClientConfig::validate`]).
    pub fn from_config(config: ClientConfig) -> Result<FlowBuilder, ConfigError> {
        config.validate()?;
        Ok(FlowBuilder::new(config))
    }

    /// Get the underlying REST client.
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The default signer, if one is configured.
    pub fn signer(&self) -> Option<&Arc<dyn Signer>> {
        self.signer.as_ref()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Get an account: balance, keys in node order, and contracts.
    ///
    /// The whole query, retries included, is bounded by the request timeout
    /// unless overridden with [`AccountQuery::timeout`].
    pub fn account(&self, address: impl AsRef<str>) -> AccountQuery {
        AccountQuery::new(self.rest.clone(), self.network(), address)
            .timeout(self.config.request_timeout())
    }

    /// Get an account's balance, raw. Bounded like [`Flow::account`].
    pub fn balance(&self, address: impl AsRef<str>) -> BalanceQuery {
        BalanceQuery::new(self.rest.clone(), self.network(), address)
            .timeout(self.config.request_timeout())
    }

    /// The latest finalized block.
    pub async fn latest_block(&self) -> Result<Block, Error> {
        Ok(self.rest.latest_block().await?)
    }

    /// Look up a transaction result once.
    pub async fn transaction_result(
        &self,
        transaction_id: impl AsRef<str>,
    ) -> Result<TransactionResult, Error> {
        let transaction_id: Identifier = transaction_id
            .as_ref()
            .parse()
            .map_err(ValidationError::from)?;
        match self.rest.transaction_result(&transaction_id).await {
            Ok(result) => Ok(result),
            Err(RestError::NotFound(_)) => Err(Error::TransactionNotFound {
                transaction_id,
                network: self.network(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Explorer page for a transaction on this network.
    pub fn explorer_url(&self, transaction_id: &Identifier) -> String {
        self.network().explorer_url(transaction_id)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Start building a transaction from a Cadence script.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use flow_kit::*;
    /// # async fn example(flow: Flow) -> Result<(), flow_kit::Error> {
    /// let sealed = flow
    ///     .transaction(r#"
    ///         transaction(amount: UFix64, to: Address) {
    ///             prepare(signer: &Account) {}
    ///         }
    ///     "#)
    ///     .argument(Argument::ufix64("10.0")?)
    ///     .argument("0x25f823e2a115b2dc".parse::<Address>().map_err(ValidationError::from)?)
    ///     .send()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn transaction(&self, script: impl Into<String>) -> TransactionBuilder {
        TransactionBuilder::new(
            self.rest.clone(),
            &self.config,
            self.key_locks.clone(),
            self.signer.clone(),
            script,
        )
    }

    /// Submit a signed envelope. Returns once the node has accepted it.
    ///
    /// A pre-signed envelope cannot be re-signed, so an expired reference
    /// block is reported rather than retried.
    pub async fn submit(&self, envelope: &SignedEnvelope) -> Result<Submission, Error> {
        submit_envelope(&self.rest, envelope, self.network()).await
    }

    /// Wait for a submitted transaction to seal.
    pub fn wait(&self, transaction_id: Identifier) -> SealWait {
        self.wait_for(Submission::new(transaction_id, self.network()))
    }

    /// Wait for a submission returned by [`Flow::submit`] to seal.
    pub fn wait_for(&self, submission: Submission) -> SealWait {
        SealWait::new(
            self.rest.clone(),
            submission,
            self.config.poll.clone(),
            self.config.deadline(),
        )
    }

    /// Poll once and update the submission in place. Returns whether it
    /// changed; terminal submissions are never touched.
    pub async fn refresh(&self, submission: &mut Submission) -> Result<bool, Error> {
        refresh_once(&self.rest, submission).await
    }
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("rest", &self.rest)
            .field("network", &self.network())
            .field("signer", &self.signer.as_ref().map(|s| s.address()))
            .finish()
    }
}

/// Builder for creating a [`Flow`] client.
///
/// # Example
///
/// ```rust,no_run
/// use flow_kit::*;
///
/// # fn example() -> Result<(), flow_kit::Error> {
/// // Local emulator on a non-default port
/// let flow = Flow::emulator()
///     .rest_url("http://127.0.0.1:8889")
///     .serialize_per_key(true)
///     .build();
/// # Ok(())
/// # }
/// ```
pub struct FlowBuilder {
    config: ClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl FlowBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            signer: None,
        }
    }

    /// Set the default signer for transactions.
    pub fn signer(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Set up signing with a hex private key.
    ///
    /// This is a convenience method that creates an [`InMemorySigner`].
    pub fn credentials(
        mut self,
        address: impl AsRef<str>,
        key_index: u32,
        private_key: impl AsRef<str>,
        signature_algorithm: SignatureAlgorithm,
        hash_algorithm: HashAlgorithm,
    ) -> Result<Self, Error> {
        let signer = InMemorySigner::new(
            address,
            key_index,
            private_key,
            signature_algorithm,
            hash_algorithm,
        )?;
        self.signer = Some(Arc::new(signer));
        Ok(self)
    }

    /// Override the network's REST base URL.
    pub fn rest_url(mut self, url: impl Into<String>) -> Self {
        self.config.rest_url = Some(url.into());
        self
    }

    /// Set the retry configuration for transient HTTP failures.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.config.retry = config;
        self
    }

    /// Set the poll schedule for transaction results.
    ///
    /// A zero first interval is raised to 1 ms and the cap to at least the
    /// first interval.
    pub fn poll_config(mut self, config: PollConfig) -> Self {
        self.config.poll = config.clamped();
        self
    }

    /// Per-request timeout, at least 1 ms.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = saturating_millis(timeout).max(1);
        self
    }

    /// Default overall deadline for submissions, at least 1 ms.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.config.deadline_ms = saturating_millis(deadline).max(1);
        self
    }

    pub fn max_expiry_retries(mut self, retries: u32) -> Self {
        self.config.max_expiry_retries = retries;
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.config.gas_limit = gas_limit;
        self
    }

    /// Serialize submissions that share a proposal key by default.
    pub fn serialize_per_key(mut self, serialize: bool) -> Self {
        self.config.serialize_per_key = serialize;
        self
    }

    /// Build the client.
    ///
    /// A blank REST URL override falls back to the network's registry entry,
    /// and timing settings are clamped as in the setters.
    pub fn build(mut self) -> Flow {
        self.config.clamp();
        let rest_url = match self.config.resolved_rest_url() {
            Ok(url) => url,
            Err(_) => {
                self.config.rest_url = None;
                self.config.network.endpoint().rest_url.to_string()
            }
        };
        Flow {
            rest: Arc::new(RestClient::with_config(
                rest_url,
                self.config.retry.clone(),
                self.config.request_timeout(),
            )),
            signer: self.signer,
            config: self.config,
            key_locks: Arc::new(KeyLocks::new()),
        }
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl From<FlowBuilder> for Flow {
    fn from(builder: FlowBuilder) -> Self {
        builder.build()
    }
}
