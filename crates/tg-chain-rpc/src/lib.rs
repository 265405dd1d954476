use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tg_provider::{Eip1193Provider, Eip1193Transport, ProviderError, ProviderLocator, WalletProvider};
use tracing::debug;

pub const RPC_URL_VAR: &str = "TAMAGOTCHI_RPC_URL";
pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// EIP-1193 transport over plain JSON-RPC.
///
/// Reads `TAMAGOTCHI_RPC_URL` from environment at construction time
/// (default: `http://localhost:8545`). Intended for dev nodes with unlocked
/// accounts, which sign `eth_sendTransaction` themselves.
pub struct HttpTransport {
    endpoint: String,
    http: reqwest::Client,
    next_id: Cell<u64>,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HttpTransport {
    pub fn new(endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var(RPC_URL_VAR).ok())
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            next_id: Cell::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

// ── JSON-RPC envelope ──

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[async_trait(?Send)]
impl Eip1193Transport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        // A node has no authorization prompt; its unlocked accounts are the grant.
        let method = match method {
            "eth_requestAccounts" => "eth_accounts",
            other => other,
        };
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        debug!(id, method, endpoint = %self.endpoint, "json-rpc request");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{method}: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("{method}: {e}")))?;

        let body: RpcResponse = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(ProviderError::Transport(format!("{method} HTTP {status}: {text}")));
            }
            Err(e) => return Err(ProviderError::Decode(format!("{method}: {e}"))),
        };

        if let Some(err) = body.error {
            return Err(ProviderError::Rejected {
                code: Some(err.code),
                message: err.message,
            });
        }

        Ok(body.result.unwrap_or(Value::Null))
    }

    async fn pause(&self, millis: u32) {
        tokio::time::sleep(Duration::from_millis(millis.into())).await;
    }
}

pub type RpcProvider = Eip1193Provider<HttpTransport>;

/// Always locates the one JSON-RPC provider it was built with.
pub struct RpcLocator {
    provider: Rc<RpcProvider>,
}

impl RpcLocator {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            provider: Rc::new(Eip1193Provider::new(HttpTransport::new(endpoint))),
        }
    }
}

impl ProviderLocator for RpcLocator {
    fn locate(&self) -> Option<Rc<dyn WalletProvider>> {
        Some(Rc::clone(&self.provider) as Rc<dyn WalletProvider>)
    }
}
