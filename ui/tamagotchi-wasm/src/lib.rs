//! Tamagotchi WASM Frontend
//!
//! Connects to the injected browser wallet and forwards the three buttons to
//! the Tamagotchi contract. Session handling lives in `tg-session`; this
//! crate only supplies the browser side of it.

pub mod config;
pub mod dom;
pub mod ethereum;
pub mod events;
pub mod host;

use std::rc::Rc;
use tg_session::SessionManager;
use wasm_bindgen::prelude::*;

/// WASM entry point – called automatically when the module is instantiated.
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    // Improve panic messages in the browser console
    console_error_panic_hook::set_once();

    init().await
}

async fn init() -> Result<(), JsValue> {
    let els = dom::Elements::bind()?;
    let host = Rc::new(host::DomHost::new(els.output.clone()));

    let config = match config::load() {
        Ok(config) => config,
        Err(e) => {
            host.show_error(&e);
            return Err(JsValue::from_str(&e));
        }
    };

    let manager = Rc::new(SessionManager::new(ethereum::InjectedLocator, config, host));
    manager.attach_events();
    events::bind_events(&els, &manager)?;

    // Failures are rendered by the manager; the buttons reconnect on click.
    let _ = manager.connect().await;

    Ok(())
}
