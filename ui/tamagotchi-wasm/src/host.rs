use crate::dom;
use tg_session::{Host, Output};
use web_sys::Element;

/// Renders session output into the page's `#output` element.
pub struct DomHost {
    output: Element,
}

impl DomHost {
    pub fn new(output: Element) -> Self {
        Self { output }
    }

    pub fn show_error(&self, msg: &str) {
        gloo_console::error!(msg);
        dom::add_class(&self.output, "error");
        dom::set_text(&self.output, msg);
    }
}

impl Host for DomHost {
    fn render(&self, output: Output) {
        match &output {
            Output::Error(msg) => self.show_error(msg),
            Output::Message(msg) => {
                gloo_console::log!(msg);
                dom::remove_class(&self.output, "error");
                dom::set_text(&self.output, msg);
            }
        }
    }

    fn reload(&self) {
        if let Err(e) = dom::window().location().reload() {
            gloo_console::error!("reload failed:", e);
        }
    }
}
