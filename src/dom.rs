//! Lookups against the document contract shared by every subsystem.
//!
//! The persistent chrome (player widget, navbar, message box) is allowed to
//! be absent on stripped-down pages, so everything here hands back `Option`
//! and callers degrade to no-ops.

use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlAnchorElement, HtmlElement, HtmlInputElement, Window};

pub(crate) fn window() -> Option<Window> {
    web_sys::window()
}

pub(crate) fn document() -> Option<Document> {
    web_sys::window()?.document()
}

pub(crate) fn by_id(id: &str) -> Option<Element> {
    document()?.get_element_by_id(id)
}

pub(crate) fn html_by_id(id: &str) -> Option<HtmlElement> {
    by_id(id)?.dyn_into().ok()
}

pub(crate) fn input_by_id(id: &str) -> Option<HtmlInputElement> {
    by_id(id)?.dyn_into().ok()
}

pub(crate) fn anchor_by_id(id: &str) -> Option<HtmlAnchorElement> {
    by_id(id)?.dyn_into().ok()
}

/// The signed-in username from `#main`'s dataset, if any.
pub(crate) fn page_username() -> Option<String> {
    let main = html_by_id("main")?;
    main.dataset().get("username").filter(|name| !name.is_empty())
}
