//! Event binding.
//!
//! Each button spawns its contract call with
//! `wasm_bindgen_futures::spawn_local`. Calls are not deduplicated: repeated
//! clicks run concurrently.

use crate::dom::Elements;
use std::rc::Rc;
use tg_api_types::Action;
use tg_session::SessionManager;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::HtmlElement;

/// Bind the three action buttons. Call once after init.
pub fn bind_events(els: &Elements, manager: &Rc<SessionManager>) -> Result<(), JsValue> {
    on_click_dispatch(&els.feed_button, manager, Action::Feed)?;
    on_click_dispatch(&els.play_button, manager, Action::Play)?;
    on_click_dispatch(&els.check_health_button, manager, Action::CheckHealth)?;
    Ok(())
}

fn on_click_dispatch(
    button: &HtmlElement,
    manager: &Rc<SessionManager>,
    action: Action,
) -> Result<(), JsValue> {
    let manager = Rc::clone(manager);
    let cb = Closure::wrap(Box::new(move |_: web_sys::MouseEvent| {
        let manager = Rc::clone(&manager);
        wasm_bindgen_futures::spawn_local(async move {
            manager.dispatch(action).await;
        });
    }) as Box<dyn FnMut(_)>);
    button.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())?;
    cb.forget();
    Ok(())
}
