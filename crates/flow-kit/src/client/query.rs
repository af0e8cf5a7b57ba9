//! Query builders for account reads.
//!
//! Query builders implement `IntoFuture` so they can be `.await`ed directly.
//! An address that fails to parse surfaces as an error when the query is
//! awaited.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, RestError, ValidationError};
use crate::types::{AccountSnapshot, Address, Network, UFix64};

use super::rest::RestClient;

/// Fetch an account, mapping a 404 onto [`Error::AccountNotFound`].
pub(crate) async fn fetch_account(
    rest: &RestClient,
    address: Address,
    network: Network,
) -> Result<AccountSnapshot, Error> {
    match rest.account(&address).await {
        Ok(account) => Ok(account),
        Err(RestError::NotFound(_)) => Err(Error::AccountNotFound { address, network }),
        Err(e) => Err(e.into()),
    }
}

async fn with_timeout<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| RestError::Timeout(limit))?,
        None => fut.await,
    }
}

// ============================================================================
// AccountQuery
// ============================================================================

/// Query builder for an account snapshot: balance, keys and contracts.
///
/// # Example
///
/// ```rust,no_run
/// # use flow_kit::*;
/// # async fn example() -> Result<(), flow_kit::Error> {
/// let flow = Flow::testnet().build();
///
/// let account = flow.account("0x36395f9dde50ea27").await?;
/// for key in account.active_keys() {
///     println!("key #{}: {} / {}", key.index, key.signature_algorithm, key.hash_algorithm);
/// }
/// # Ok(())
/// # }
/// ```
pub struct AccountQuery {
    rest: Arc<RestClient>,
    network: Network,
    address: Result<Address, ValidationError>,
    timeout: Option<Duration>,
}

impl AccountQuery {
    pub(crate) fn new(rest: Arc<RestClient>, network: Network, address: impl AsRef<str>) -> Self {
        Self {
            rest,
            network,
            address: Address::normalize(address).map_err(ValidationError::from),
            timeout: None,
        }
    }

    /// Bound the whole query, retries included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl IntoFuture for AccountQuery {
    type Output = Result<AccountSnapshot, Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let address = self.address?;
            with_timeout(
                self.timeout,
                fetch_account(&self.rest, address, self.network),
            )
            .await
        })
    }
}

// ============================================================================
// BalanceQuery
// ============================================================================

/// Query builder for an account's FLOW balance.
///
/// The balance is returned raw; use [`UFix64::to_token_string`] to format it.
///
/// # Example
///
/// ```rust,no_run
/// # use flow_kit::*;
/// # async fn example() -> Result<(), flow_kit::Error> {
/// let flow = Flow::testnet().build();
///
/// let balance = flow.balance("0x36395f9dde50ea27").await?;
/// println!("{}", balance.to_token_string());
/// # Ok(())
/// # }
/// ```
pub struct BalanceQuery {
    inner: AccountQuery,
}

impl BalanceQuery {
    pub(crate) fn new(rest: Arc<RestClient>, network: Network, address: impl AsRef<str>) -> Self {
        Self {
            inner: AccountQuery::new(rest, network, address),
        }
    }

    /// Bound the whole query, retries included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.timeout(timeout);
        self
    }
}

impl IntoFuture for BalanceQuery {
    type Output = Result<UFix64, Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { Ok(self.inner.await?.balance) })
    }
}
