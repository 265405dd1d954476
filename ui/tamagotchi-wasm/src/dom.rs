//! DOM element bindings.
//!
//! All fields are resolved once at startup.

use wasm_bindgen::prelude::*;
use web_sys::{Element, HtmlElement};

// ── Helpers ──

pub fn by_id(id: &str) -> Option<Element> {
    gloo_utils::document().get_element_by_id(id)
}

pub fn by_id_typed<T: JsCast>(id: &str) -> Option<T> {
    by_id(id).and_then(|e| e.dyn_into::<T>().ok())
}

pub fn query(selector: &str) -> Option<Element> {
    gloo_utils::document().query_selector(selector).ok()?
}

pub fn set_text(el: &Element, text: &str) {
    el.set_text_content(Some(text));
}

pub fn add_class(el: &Element, cls: &str) {
    let _ = el.class_list().add_1(cls);
}

pub fn remove_class(el: &Element, cls: &str) {
    let _ = el.class_list().remove_1(cls);
}

pub fn window() -> web_sys::Window {
    gloo_utils::window()
}

// ── Elements struct ──

/// Clone-friendly (all inner types are reference-counted via JS GC).
#[derive(Clone)]
pub struct Elements {
    pub output: Element,
    pub feed_button: HtmlElement,
    pub play_button: HtmlElement,
    pub check_health_button: HtmlElement,
}

macro_rules! get_el {
    ($id:expr) => {
        by_id($id).ok_or_else(|| JsValue::from_str(&format!("missing element #{}", $id)))?
    };
}

macro_rules! get_html {
    ($id:expr) => {
        by_id_typed::<HtmlElement>($id)
            .ok_or_else(|| JsValue::from_str(&format!("missing html element #{}", $id)))?
    };
}

impl Elements {
    /// Resolve all DOM references. Call once after DOMContentLoaded.
    pub fn bind() -> Result<Elements, JsValue> {
        Ok(Elements {
            output: get_el!("output"),
            feed_button: get_html!("feedButton"),
            play_button: get_html!("playButton"),
            check_health_button: get_html!("checkHealthButton"),
        })
    }
}
