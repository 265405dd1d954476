//! Wallet provider capabilities.
//!
//! `WalletProvider` and `ContractHandle` are the seams the session layer talks
//! to. `Eip1193Provider` implements both on top of any transport that speaks
//! the EIP-1193 `request`/`on` interface: the injected browser wallet, a
//! JSON-RPC node, or a test double.

use alloy_primitives::hex;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::rc::Rc;
use tg_api_types::{AccountId, ChainId, ContractAddress, ProviderEvent};
use tg_contract::ContractError;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The wallet or node refused the request. `message` is shown to the user as-is.
    #[error("{message}")]
    Rejected { code: Option<i64>, message: String },
    #[error("provider transport failed: {0}")]
    Transport(String),
    #[error("unexpected provider response: {0}")]
    Decode(String),
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl ProviderError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            code: None,
            message: message.into(),
        }
    }
}

#[async_trait(?Send)]
pub trait WalletProvider {
    /// Ask the wallet for account authorization.
    async fn request_accounts(&self) -> Result<Vec<AccountId>, ProviderError>;

    /// Bind a contract handle to this provider.
    fn contract(&self, address: &ContractAddress) -> Rc<dyn ContractHandle>;

    fn subscribe(&self, listener: Rc<dyn Fn(ProviderEvent)>);
}

#[async_trait(?Send)]
pub trait ContractHandle {
    fn address(&self) -> &ContractAddress;

    /// Send a state-mutating transaction from `from`. Resolves to the transaction hash.
    async fn call_mutating(&self, method: &str, from: &AccountId) -> Result<String, ProviderError>;

    async fn call_read_only(&self, method: &str) -> Result<String, ProviderError>;
}

/// Finds the wallet provider in the current environment, if any.
pub trait ProviderLocator {
    fn locate(&self) -> Option<Rc<dyn WalletProvider>>;
}

impl<F> ProviderLocator for F
where
    F: Fn() -> Option<Rc<dyn WalletProvider>>,
{
    fn locate(&self) -> Option<Rc<dyn WalletProvider>> {
        self()
    }
}

// ── EIP-1193 ──

#[async_trait(?Send)]
pub trait Eip1193Transport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Register an event handler. Transports without push events ignore this.
    fn on(&self, _event: &str, _handler: Box<dyn Fn(Value)>) {}

    /// Wait between receipt polls.
    async fn pause(&self, millis: u32);
}

/// Delay between `eth_getTransactionReceipt` polls.
pub const RECEIPT_POLL_MS: u32 = 1_000;

pub const REVERTED_MESSAGE: &str = "Transaction has been reverted by the EVM";

pub struct Eip1193Provider<T> {
    transport: Rc<T>,
}

impl<T> Eip1193Provider<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Rc::new(transport),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait(?Send)]
impl<T> WalletProvider for Eip1193Provider<T>
where
    T: Eip1193Transport + 'static,
{
    async fn request_accounts(&self) -> Result<Vec<AccountId>, ProviderError> {
        let value = self
            .transport
            .request("eth_requestAccounts", json!([]))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| ProviderError::Decode(format!("eth_requestAccounts: {e}")))
    }

    fn contract(&self, address: &ContractAddress) -> Rc<dyn ContractHandle> {
        Rc::new(Eip1193Contract {
            transport: Rc::clone(&self.transport),
            address: address.clone(),
        })
    }

    fn subscribe(&self, listener: Rc<dyn Fn(ProviderEvent)>) {
        let on_accounts = Rc::clone(&listener);
        self.transport.on(
            "accountsChanged",
            Box::new(move |payload| match serde_json::from_value(payload) {
                Ok(accounts) => on_accounts(ProviderEvent::AccountsChanged(accounts)),
                Err(e) => warn!(error = %e, "ignoring malformed accountsChanged payload"),
            }),
        );
        self.transport.on(
            "chainChanged",
            Box::new(move |payload| {
                let chain = match payload {
                    Value::String(id) => id,
                    other => other.to_string(),
                };
                listener(ProviderEvent::ChainChanged(ChainId(chain)));
            }),
        );
    }
}

pub struct Eip1193Contract<T> {
    transport: Rc<T>,
    address: ContractAddress,
}

impl<T> Eip1193Contract<T>
where
    T: Eip1193Transport,
{
    /// Poll until the transaction is mined. No timeout: a transaction that
    /// never lands keeps the call pending.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<(), ProviderError> {
        loop {
            let receipt = self
                .transport
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;

            if receipt.is_null() {
                self.transport.pause(RECEIPT_POLL_MS).await;
                continue;
            }

            // Pre-Byzantium receipts carry no status field.
            return match receipt.get("status").and_then(Value::as_str) {
                Some("0x0") => {
                    warn!(tx_hash, "transaction reverted");
                    Err(ProviderError::rejected(REVERTED_MESSAGE))
                }
                _ => {
                    debug!(tx_hash, "transaction mined");
                    Ok(())
                }
            };
        }
    }
}

#[async_trait(?Send)]
impl<T> ContractHandle for Eip1193Contract<T>
where
    T: Eip1193Transport,
{
    fn address(&self) -> &ContractAddress {
        &self.address
    }

    async fn call_mutating(&self, method: &str, from: &AccountId) -> Result<String, ProviderError> {
        let data = tg_contract::encode_call(method)?;
        debug!(method, from = %from, to = %self.address, "eth_sendTransaction");

        let tx = json!({
            "from": from.0,
            "to": self.address.0,
            "data": hex::encode_prefixed(&data),
        });
        let value = self
            .transport
            .request("eth_sendTransaction", json!([tx]))
            .await?;

        let tx_hash = match value {
            Value::String(tx_hash) => tx_hash,
            other => {
                return Err(ProviderError::Decode(format!(
                    "eth_sendTransaction returned {other}"
                )));
            }
        };

        self.wait_for_receipt(&tx_hash).await?;
        Ok(tx_hash)
    }

    async fn call_read_only(&self, method: &str) -> Result<String, ProviderError> {
        let data = tg_contract::encode_call(method)?;
        debug!(method, to = %self.address, "eth_call");

        let call = json!({
            "to": self.address.0,
            "data": hex::encode_prefixed(&data),
        });
        let value = self
            .transport
            .request("eth_call", json!([call, "latest"]))
            .await?;

        let Some(raw) = value.as_str() else {
            return Err(ProviderError::Decode(format!("eth_call returned {value}")));
        };
        let output = hex::decode(raw)
            .map_err(|e| ProviderError::Decode(format!("eth_call output is not hex: {e}")))?;

        Ok(tg_contract::decode_output(method, &output)?)
    }
}
