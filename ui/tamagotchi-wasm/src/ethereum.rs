//! Injected wallet bindings.
//!
//! Wraps the EIP-1193 object a wallet extension places on `window.ethereum`
//! and exposes it to the session layer as an `Eip1193Transport`.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;
use tg_provider::{Eip1193Provider, Eip1193Transport, ProviderError, ProviderLocator, WalletProvider};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::dom;

#[wasm_bindgen]
extern "C" {
    #[derive(Clone)]
    pub type Ethereum;

    #[wasm_bindgen(method, catch)]
    fn request(this: &Ethereum, args: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method)]
    fn on(this: &Ethereum, event: &str, handler: &js_sys::Function);
}

/// `window.ethereum`, if a wallet extension injected one.
pub fn injected() -> Option<Ethereum> {
    let value = js_sys::Reflect::get(&dom::window(), &JsValue::from_str("ethereum")).ok()?;
    if value.is_undefined() || value.is_null() {
        return None;
    }
    Some(value.unchecked_into())
}

#[derive(Serialize)]
struct RequestArguments<'a> {
    method: &'a str,
    params: &'a Value,
}

pub struct InjectedTransport {
    ethereum: Ethereum,
}

impl InjectedTransport {
    pub fn new(ethereum: Ethereum) -> Self {
        Self { ethereum }
    }
}

#[async_trait(?Send)]
impl Eip1193Transport for InjectedTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let args = RequestArguments {
            method,
            params: &params,
        }
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| ProviderError::Transport(format!("{method}: {e}")))?;

        let promise = self.ethereum.request(&args).map_err(rejection)?;
        let value = JsFuture::from(promise).await.map_err(rejection)?;

        if value.is_undefined() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(value)
            .map_err(|e| ProviderError::Decode(format!("{method}: {e}")))
    }

    async fn pause(&self, millis: u32) {
        gloo_timers::future::TimeoutFuture::new(millis).await;
    }

    fn on(&self, event: &str, handler: Box<dyn Fn(Value)>) {
        let name = event.to_string();
        let cb = Closure::wrap(Box::new(move |payload: JsValue| {
            match serde_wasm_bindgen::from_value::<Value>(payload) {
                Ok(value) => handler(value),
                Err(e) => gloo_console::warn!("ignoring malformed", name.as_str(), "payload:", e.to_string()),
            }
        }) as Box<dyn FnMut(JsValue)>);
        self.ethereum.on(event, cb.as_ref().unchecked_ref());
        cb.forget();
    }
}

/// Map a rejected provider promise to `ProviderError::Rejected`, keeping the
/// wallet's `message` and numeric `code` (e.g. 4001 for a user rejection).
fn rejection(err: JsValue) -> ProviderError {
    let field = |name: &str| js_sys::Reflect::get(&err, &JsValue::from_str(name)).ok();

    let message = field("message")
        .and_then(|m| m.as_string())
        .or_else(|| err.as_string())
        .unwrap_or_else(|| format!("{err:?}"));
    let code = field("code").and_then(|c| c.as_f64()).map(|c| c as i64);

    ProviderError::Rejected { code, message }
}

/// Looks up `window.ethereum` each time a session is established.
pub struct InjectedLocator;

impl ProviderLocator for InjectedLocator {
    fn locate(&self) -> Option<Rc<dyn WalletProvider>> {
        let ethereum = injected()?;
        Some(Rc::new(Eip1193Provider::new(InjectedTransport::new(ethereum))) as Rc<dyn WalletProvider>)
    }
}
