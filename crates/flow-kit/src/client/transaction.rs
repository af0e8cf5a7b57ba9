//! Transaction builder with fluent API.
//!
//! # Example
//!
//! ```rust,no_run
//! # use flow_kit::*;
//! # async fn example() -> Result<(), flow_kit::Error> {
//! let flow = Flow::testnet()
//!     .credentials(
//!         "0x36395f9dde50ea27",
//!         0,
//!         "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721",
//!         SignatureAlgorithm::EcdsaP256,
//!         HashAlgorithm::Sha3_256,
//!     )?
//!     .build();
//!
//! let sealed = flow
//!     .transaction("transaction(amount: UFix64) { prepare(signer: &Account) {} }")
//!     .argument(Argument::ufix64("1.5")?)
//!     .send()
//!     .await?;
//! println!("sealed: {}", sealed.explorer_url);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{try_join, try_join_all};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigError, Error, ValidationError};
use crate::types::{
    AccountSnapshot, Address, Argument, Identifier, KeyEntry, Network, ProposalKey,
    ScriptSignature, SignedEnvelope, Submission, TransactionSpec, UnsignedTransaction,
};

use super::config::{ClientConfig, PollConfig};
use super::key_lock::KeyLocks;
use super::query::fetch_account;
use super::rest::RestClient;
use super::signer::{Signer, check_key, check_weight};
use super::submission::{instant_after, poll_until_terminal, submit_envelope};

/// Builder for a transaction: script, arguments, roles and signers.
///
/// Roles default from the signers: the first signer proposes, the proposer
/// pays, and a script whose `prepare` block takes parameters is authorized
/// by the proposer.
pub struct TransactionBuilder {
    rest: Arc<RestClient>,
    network: Network,
    key_locks: Arc<KeyLocks>,
    default_signer: Option<Arc<dyn Signer>>,
    signers: Vec<Arc<dyn Signer>>,

    script: String,
    arguments: Vec<Argument>,
    proposer: Option<Address>,
    proposal_key_index: Option<u32>,
    payer: Option<Address>,
    authorizers: Vec<Address>,
    gas_limit: u64,
    reference_block: Option<Identifier>,

    poll: PollConfig,
    deadline: Duration,
    max_expiry_retries: u32,
    serialize_per_key: bool,
    cancel: CancellationToken,

    /// First malformed input; reported when the builder is used.
    error: Option<ValidationError>,
}

impl TransactionBuilder {
    pub(crate) fn new(
        rest: Arc<RestClient>,
        config: &ClientConfig,
        key_locks: Arc<KeyLocks>,
        default_signer: Option<Arc<dyn Signer>>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            rest,
            network: config.network,
            key_locks,
            default_signer,
            signers: Vec::new(),
            script: script.into(),
            arguments: Vec::new(),
            proposer: None,
            proposal_key_index: None,
            payer: None,
            authorizers: Vec::new(),
            gas_limit: config.gas_limit,
            reference_block: None,
            poll: config.poll.clone(),
            deadline: config.deadline(),
            max_expiry_retries: config.max_expiry_retries,
            serialize_per_key: config.serialize_per_key,
            cancel: CancellationToken::new(),
            error: None,
        }
    }

    /// Append one argument.
    pub fn argument(mut self, argument: impl Into<Argument>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    /// Append several arguments.
    pub fn arguments(mut self, arguments: impl IntoIterator<Item = Argument>) -> Self {
        self.arguments.extend(arguments);
        self
    }

    /// The account whose key proposes the transaction. The key is the first
    /// signer's key for that account.
    pub fn proposer(mut self, address: impl AsRef<str>) -> Self {
        self.proposer = self.parse(address);
        self
    }

    /// The exact proposal key.
    pub fn proposal_key(mut self, address: impl AsRef<str>, key_index: u32) -> Self {
        self.proposer = self.parse(address);
        self.proposal_key_index = Some(key_index);
        self
    }

    /// The account paying the fees.
    pub fn payer(mut self, address: impl AsRef<str>) -> Self {
        self.payer = self.parse(address);
        self
    }

    /// Append an authorizer. Order matches the `prepare` parameters.
    pub fn authorizer(mut self, address: impl AsRef<str>) -> Self {
        if let Some(address) = self.parse(address) {
            self.authorizers.push(address);
        }
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Use this reference block instead of fetching the latest one.
    ///
    /// Only the first attempt uses it; a resubmission after expiry always
    /// fetches a fresh block.
    pub fn reference_block(mut self, block_id: Identifier) -> Self {
        self.reference_block = Some(block_id);
        self
    }

    /// Add a signer. Once any signer is added, the client's default signer
    /// is no longer used.
    pub fn sign_with(mut self, signer: impl Signer + 'static) -> Self {
        self.signers.push(Arc::new(signer));
        self
    }

    /// Hold the proposal key's lock until this transaction is terminal.
    pub fn serialize_per_key(mut self, serialize: bool) -> Self {
        self.serialize_per_key = serialize;
        self
    }

    /// Abort when this token is cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Overall deadline for submission and confirmation.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Resubmissions after the reference block expired.
    pub fn max_expiry_retries(mut self, retries: u32) -> Self {
        self.max_expiry_retries = retries;
        self
    }

    /// Build and sign without submitting.
    ///
    /// Fetches the signers' accounts (and the latest block unless one was
    /// set), checks every signer against its on-chain key, and signs.
    pub async fn sign(self) -> Result<SignedEnvelope, Error> {
        let plan = self.plan()?;
        plan.prepare(self.reference_block).await
    }

    /// Sign, submit and wait until sealed.
    pub fn send(self) -> TransactionSend {
        TransactionSend { builder: self }
    }

    fn parse(&mut self, address: impl AsRef<str>) -> Option<Address> {
        match Address::normalize(address) {
            Ok(address) => Some(address),
            Err(e) => {
                self.error.get_or_insert(e.into());
                None
            }
        }
    }

    /// Resolve roles and signers. Everything here is local.
    fn plan(&self) -> Result<Plan, Error> {
        if let Some(e) = &self.error {
            return Err(e.clone().into());
        }

        let signers = if self.signers.is_empty() {
            vec![self.default_signer.clone().ok_or(ConfigError::NoSigner)?]
        } else {
            self.signers.clone()
        };

        let proposer = match (self.proposer, self.proposal_key_index) {
            (Some(address), Some(key_index)) => (address, key_index),
            (Some(address), None) => signers
                .iter()
                .find(|s| s.address() == address)
                .map(|s| (address, s.key_index()))
                .ok_or(ConfigError::MissingSigner(address))?,
            (None, _) => (signers[0].address(), signers[0].key_index()),
        };
        if !signers
            .iter()
            .any(|s| (s.address(), s.key_index()) == proposer)
        {
            return Err(ConfigError::ProposalKeyNotSigned {
                address: proposer.0,
                key_index: proposer.1,
            }
            .into());
        }

        let payer = self.payer.unwrap_or(proposer.0);
        let authorizers = if self.authorizers.is_empty()
            && ScriptSignature::parse(&self.script)?.authorizers > 0
        {
            vec![proposer.0]
        } else {
            self.authorizers.clone()
        };

        Ok(Plan {
            rest: self.rest.clone(),
            network: self.network,
            signers,
            script: self.script.clone(),
            arguments: self.arguments.clone(),
            proposer,
            payer,
            authorizers,
            gas_limit: self.gas_limit,
        })
    }
}

/// Resolved roles, ready to be turned into a signed envelope.
struct Plan {
    rest: Arc<RestClient>,
    network: Network,
    signers: Vec<Arc<dyn Signer>>,
    script: String,
    arguments: Vec<Argument>,
    proposer: (Address, u32),
    payer: Address,
    authorizers: Vec<Address>,
    gas_limit: u64,
}

impl std::fmt::Debug for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plan")
            .field("rest", &self.rest)
            .field("network", &self.network)
            .field("signers", &self.signers.len())
            .field("script", &self.script)
            .field("arguments", &self.arguments)
            .field("proposer", &self.proposer)
            .field("payer", &self.payer)
            .field("authorizers", &self.authorizers)
            .field("gas_limit", &self.gas_limit)
            .finish()
    }
}

impl Plan {
    /// Fetch accounts and a reference block, check keys, build and sign.
    async fn prepare(&self, reference_block: Option<Identifier>) -> Result<SignedEnvelope, Error> {
        let mut addresses: Vec<Address> = Vec::new();
        for signer in &self.signers {
            if !addresses.contains(&signer.address()) {
                addresses.push(signer.address());
            }
        }

        let accounts = try_join_all(
            addresses
                .iter()
                .map(|address| fetch_account(&self.rest, *address, self.network)),
        );
        let block = async {
            match reference_block {
                Some(id) => Ok::<_, Error>(id),
                None => Ok(self.rest.latest_block().await?.id),
            }
        };
        let (accounts, reference_block_id): (Vec<AccountSnapshot>, Identifier) =
            try_join(accounts, block).await?;

        let sequence_number = self.check_keys(&accounts)?;

        let unsigned = UnsignedTransaction::build(TransactionSpec {
            script: self.script.clone(),
            arguments: self.arguments.clone(),
            reference_block_id,
            gas_limit: self.gas_limit,
            proposal_key: ProposalKey {
                address: self.proposer.0,
                key_index: self.proposer.1,
                sequence_number,
            },
            payer: self.payer,
            authorizers: self.authorizers.clone(),
        })?;

        let signers: Vec<&dyn Signer> = self.signers.iter().map(|s| s.as_ref()).collect();
        unsigned.sign(&signers)
    }

    /// Check every signer against its on-chain key and the per-account
    /// weight. Returns the proposal key's sequence number.
    fn check_keys(&self, accounts: &[AccountSnapshot]) -> Result<u64, Error> {
        let mut by_account: BTreeMap<Address, Vec<&KeyEntry>> = BTreeMap::new();
        for signer in &self.signers {
            let account = accounts
                .iter()
                .find(|a| a.address == signer.address())
                .ok_or_else(|| {
                    Error::Protocol(format!(
                        "node returned no account for {}",
                        signer.address()
                    ))
                })?;
            let key = check_key(signer.as_ref(), account)?;
            by_account.entry(signer.address()).or_default().push(key);
        }
        for (address, keys) in &by_account {
            check_weight(*address, keys.iter().copied())?;
        }

        let (address, key_index) = self.proposer;
        by_account
            .get(&address)
            .and_then(|keys| keys.iter().find(|k| k.index == key_index))
            .map(|key| key.sequence_number)
            .ok_or(Error::Config(ConfigError::ProposalKeyNotSigned { address, key_index }))
    }
}

// ============================================================================
// TransactionSend
// ============================================================================

/// Future for signing, submitting and confirming a transaction.
///
/// Resolves to the sealed [`Submission`]. An expired reference block is
/// retried with a fresh block and the current sequence number, up to the
/// configured number of times; nothing else is resubmitted.
pub struct TransactionSend {
    builder: TransactionBuilder,
}

impl TransactionSend {
    /// Overall deadline for submission and confirmation.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.builder.deadline = deadline;
        self
    }

    /// Abort when this token is cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.builder.cancel = token;
        self
    }
}

impl IntoFuture for TransactionSend {
    type Output = Result<Submission, Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let builder = self.builder;
            let plan = builder.plan()?;
            let deadline = instant_after(builder.deadline);
            let cancel = &builder.cancel;

            let _key_guard = if builder.serialize_per_key {
                let (address, key_index) = plan.proposer;
                Some(
                    bounded(deadline, cancel, async {
                        Ok(builder.key_locks.lock(address, key_index).await)
                    })
                    .await?,
                )
            } else {
                None
            };

            let mut reference_block = builder.reference_block;
            let mut attempt = 0;
            loop {
                let submitted = bounded(deadline, cancel, async {
                    let envelope = plan.prepare(reference_block).await?;
                    submit_envelope(&plan.rest, &envelope, plan.network).await
                })
                .await;

                let mut submission = match submitted {
                    Ok(submission) => submission,
                    Err(e) if e.is_expired() && attempt < builder.max_expiry_retries => {
                        attempt += 1;
                        reference_block = None;
                        tracing::debug!(attempt, error = %e, "Reference block expired, resubmitting");
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                poll_until_terminal(&plan.rest, &mut submission, &builder.poll, deadline, cancel)
                    .await?;

                match submission.into_result() {
                    Err(e) if e.is_expired() && attempt < builder.max_expiry_retries => {
                        attempt += 1;
                        reference_block = None;
                        tracing::debug!(attempt, error = %e, "Transaction expired, resubmitting");
                    }
                    outcome => return outcome,
                }
            }
        })
    }
}

/// Run a pre-acceptance step under the deadline and cancellation token.
async fn bounded<T>(
    deadline: Instant,
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled {
            transaction_id: None,
            explorer_url: None,
        }),
        result = tokio::time::timeout_at(deadline, fut) => match result {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                transaction_id: None,
                last_status: None,
                explorer_url: None,
            }),
        },
    }
}
