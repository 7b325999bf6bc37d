//! Swaps fetched content into the live document and replays per-page setup.
//!
//! Exactly two regions are replaceable: `#main` and `#flashes-container`.
//! Everything outside them (player widget, navbar chrome) survives every
//! navigation untouched.

use std::cell::RefCell;

use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, DomParser, HtmlScriptElement, SupportedType};

/// A fetched page that violates the document contract. Not recoverable at
/// runtime: the template that produced it is broken.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("fetched document has no #{0} container")]
    MissingRegion(&'static str),
    #[error("live document has no #{0} container")]
    MissingLiveRegion(&'static str),
    #[error("browser refused the document swap: {0}")]
    Dom(String),
}

fn js_err(err: JsValue) -> SwapError {
    SwapError::Dom(format!("{err:?}"))
}

thread_local! {
    static CONTENT_READY: RefCell<Vec<Box<dyn Fn()>>> = RefCell::new(Vec::new());
}

/// Register a callback to run after every content swap, in registration
/// order. Callbacks must be idempotent: they also run on the initial load,
/// and again on every later swap.
pub fn on_content_ready(callback: impl Fn() + 'static) {
    CONTENT_READY.with(|list| list.borrow_mut().push(Box::new(callback)));
}

/// Run the registered callbacks, then hand external page scripts their turn
/// through a synthetic `DOMContentLoaded` on the document.
pub(crate) fn dispatch_content_ready() {
    CONTENT_READY.with(|list| {
        for callback in list.borrow().iter() {
            callback();
        }
    });

    let Some(document) = crate::dom::document() else {
        return;
    };
    if let Ok(event) = web_sys::Event::new("DOMContentLoaded") {
        let _ = document.dispatch_event(&event);
    }
}

/// Parse `html` and swap it into the live document: replace the two
/// regions, rerun inline scripts, retitle, signal content-ready, scroll up.
pub(crate) fn apply_document(html: &str) -> Result<(), SwapError> {
    let parser = DomParser::new().map_err(js_err)?;
    let incoming = parser
        .parse_from_string(html, SupportedType::TextHtml)
        .map_err(js_err)?;
    let document = crate::dom::document().ok_or(SwapError::MissingLiveRegion("main"))?;

    swap_region(&document, &incoming, "main")?;
    swap_region(&document, &incoming, "flashes-container")?;

    reanimate_scripts(&document)?;

    // The color picker binds to the DOM it was created against; drop it so
    // its owner can rebuild one for the new page.
    if let Some(picker) = document.get_element_by_id("clr-picker") {
        picker.remove();
    }

    document.set_title(&incoming.title());

    dispatch_content_ready();

    if let Some(window) = crate::dom::window() {
        window.scroll_to_with_x_and_y(0.0, 0.0);
    }

    Ok(())
}

fn swap_region(live: &Document, incoming: &Document, id: &'static str) -> Result<(), SwapError> {
    let new = incoming
        .get_element_by_id(id)
        .ok_or(SwapError::MissingRegion(id))?;
    let old = live
        .get_element_by_id(id)
        .ok_or(SwapError::MissingLiveRegion(id))?;
    let parent = old
        .parent_element()
        .ok_or(SwapError::MissingLiveRegion(id))?;
    parent.replace_child(&new, &old).map_err(js_err)?;
    Ok(())
}

/// Scripts parsed from text are inert; recreate each one in place so it
/// executes exactly once, in source order, now that the region is live.
fn reanimate_scripts(document: &Document) -> Result<(), SwapError> {
    let main = document
        .get_element_by_id("main")
        .ok_or(SwapError::MissingLiveRegion("main"))?;

    let found = main.get_elements_by_tag_name("script");
    let mut inert = Vec::with_capacity(found.length() as usize);
    for i in 0..found.length() {
        if let Some(script) = found.item(i) {
            inert.push(script);
        }
    }

    for script in inert {
        let Some(parent) = script.parent_element() else {
            continue;
        };
        let Ok(old) = script.dyn_into::<HtmlScriptElement>() else {
            continue;
        };
        let replacement: HtmlScriptElement = document
            .create_element("script")
            .map_err(js_err)?
            .dyn_into()
            .map_err(|_| SwapError::Dom("script element had the wrong type".to_string()))?;
        replacement.set_type(&old.type_());
        replacement.set_text_content(old.text_content().as_deref());
        parent.replace_child(&replacement, &old).map_err(js_err)?;
    }

    Ok(())
}
