//! AJAX navigation: intercepts in-site link and form activity and keeps the
//! browser history stack in step with the rendered document.
//!
//! Overlapping navigations deliberately race last-response-wins; there is no
//! request generation token, matching the single-user interaction model.

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue, UnwrapThrowExt};
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Document, Event, FormData, HtmlAnchorElement, HtmlElement, HtmlFormElement, PopStateEvent, Url,
};

use crate::fetcher::{self, NavigationResult};
use crate::{lifecycle, toast};

thread_local! {
    // One stable closure per kind, so re-binding an element replaces the
    // listener instead of stacking a second one.
    static ON_LINK_CLICK: Closure<dyn FnMut(Event)> =
        Closure::wrap(Box::new(handle_link_click) as Box<dyn FnMut(Event)>);
    static ON_FORM_SUBMIT: Closure<dyn FnMut(Event)> =
        Closure::wrap(Box::new(handle_form_submit) as Box<dyn FnMut(Event)>);
}

/// Attach the interception handlers to every anchor and form in the
/// document. Safe to run on every content swap.
pub(crate) fn bind_document() {
    let Some(document) = crate::dom::document() else {
        return;
    };
    ON_LINK_CLICK.with(|closure| rebind_all(&document, "a", "click", closure));
    ON_FORM_SUBMIT.with(|closure| rebind_all(&document, "form", "submit", closure));
}

fn rebind_all(document: &Document, selector: &str, kind: &str, closure: &Closure<dyn FnMut(Event)>) {
    let Ok(nodes) = document.query_selector_all(selector) else {
        return;
    };
    for i in 0..nodes.length() {
        let Some(node) = nodes.get(i) else {
            continue;
        };
        let _ = node.remove_event_listener_with_callback(kind, closure.as_ref().unchecked_ref());
        let _ = node.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref());
    }
}

fn handle_link_click(event: Event) {
    if event.default_prevented() {
        return;
    }
    let Some(anchor) = event
        .current_target()
        .and_then(|target| target.dyn_into::<HtmlAnchorElement>().ok())
    else {
        return;
    };
    let href = anchor.href();
    if !same_site(&href) {
        return;
    }
    event.prevent_default();
    event.stop_propagation();
    spawn_local(async move {
        let result = fetcher::fetch_page(&href).await;
        handle_result(result);
    });
}

fn handle_form_submit(event: Event) {
    if event.default_prevented() {
        return;
    }
    let Some(form) = event
        .target()
        .and_then(|target| target.dyn_into::<HtmlFormElement>().ok())
    else {
        return;
    };
    let action = form.action();
    if !same_site(&action) {
        return;
    }
    event.prevent_default();
    event.stop_propagation();
    let Ok(fields) = FormData::new_with_form(&form) else {
        // Unreadable form state; give up on the AJAX path entirely.
        force_reload();
        return;
    };
    let method = form.method();
    spawn_local(async move {
        let result = fetcher::submit_form(&action, &method, fields).await;
        handle_result(result);
    });
}

/// Only same-origin targets are intercepted; everything else keeps native
/// browser handling.
fn same_site(target: &str) -> bool {
    let Some(window) = crate::dom::window() else {
        return false;
    };
    let Ok(current) = window.location().href() else {
        return false;
    };
    match (Url::new(target), Url::new(&current)) {
        (Ok(target), Ok(current)) => target.origin() == current.origin(),
        _ => false,
    }
}

/// Apply one navigation outcome. For a page swap the history push happens
/// strictly before the render, so a later back-navigation finds the text in
/// place.
pub(crate) fn handle_result(result: NavigationResult) {
    match result {
        NavigationResult::Page { html, url } => {
            push_history(&html, &url);
            // A page missing a swap region is a template defect upstream;
            // fail loudly instead of rendering nothing.
            lifecycle::apply_document(&html).unwrap_throw();
        }
        NavigationResult::Toast { status, messages } => toast::show(status, &messages),
        NavigationResult::ErrorPage { html } => replace_entire_document(&html),
        NavigationResult::Reload => force_reload(),
    }
}

/// Repopulate the page from the history stack on back/forward.
pub(crate) fn watch_history() {
    let Some(window) = crate::dom::window() else {
        return;
    };
    let on_pop = Closure::wrap(Box::new(|event: PopStateEvent| {
        match event.state().as_string().filter(|text| !text.is_empty()) {
            Some(text) => lifecycle::apply_document(&text).unwrap_throw(),
            // The first stack entry carries no stored text; fetch the live
            // URL instead of failing.
            None => refetch_current(),
        }
    }) as Box<dyn FnMut(PopStateEvent)>);
    let _ = window.add_event_listener_with_callback("popstate", on_pop.as_ref().unchecked_ref());
    on_pop.forget();
}

fn refetch_current() {
    let Some(window) = crate::dom::window() else {
        return;
    };
    let Ok(href) = window.location().href() else {
        return;
    };
    spawn_local(async move {
        let result = fetcher::fetch_page(&href).await;
        handle_result(result);
    });
}

fn push_history(html: &str, url: &str) {
    let Some(window) = crate::dom::window() else {
        return;
    };
    let Ok(history) = window.history() else {
        return;
    };
    let _ = history.push_state_with_url(&JsValue::from_str(html), "", Some(url));
}

fn force_reload() {
    if let Some(window) = crate::dom::window() {
        let _ = window.location().reload();
    }
}

/// Write the server's own error body over the whole document, dropping the
/// AJAX illusion so status-specific error pages stay visible.
fn replace_entire_document(html: &str) {
    let Some(document) = crate::dom::document() else {
        return;
    };
    let chunks = js_sys::Array::of1(&JsValue::from_str(html));
    if document.write(&chunks).is_err() {
        force_reload();
        return;
    }
    let _ = document.close();
}

/// Show the right navbar affordances for the current login state.
pub(crate) fn refresh_login_state() {
    let Some(document) = crate::dom::document() else {
        return;
    };
    let username = crate::dom::page_username();
    let logged_in = username.is_some();
    set_hidden_for_class(&document, "nav-logged-in", !logged_in);
    set_hidden_for_class(&document, "nav-logged-out", logged_in);

    if let Some(username) = username {
        if let Some(label) = crate::dom::html_by_id("logged-in-status") {
            label.set_text_content(Some(&format!("Signed in as {username}")));
        }
        if let Some(link) = crate::dom::anchor_by_id("my-profile") {
            link.set_href(&format!("/users/{username}"));
        }
    }
}

fn set_hidden_for_class(document: &Document, class: &str, hidden: bool) {
    let members = document.get_elements_by_class_name(class);
    for i in 0..members.length() {
        let Some(element) = members.item(i) else {
            continue;
        };
        if let Ok(html) = element.dyn_into::<HtmlElement>() {
            html.set_hidden(hidden);
        }
    }
}

/// Render UTC `data-date` stamps in the reader's locale.
pub(crate) fn localize_dates() {
    let Some(document) = crate::dom::document() else {
        return;
    };
    let stamps = document.get_elements_by_class_name("date");
    for i in 0..stamps.length() {
        let Some(element) = stamps.item(i) else {
            continue;
        };
        let Ok(html) = element.dyn_into::<HtmlElement>() else {
            continue;
        };
        let Some(stamp) = html.dataset().get("date") else {
            continue;
        };
        let date = js_sys::Date::new(&JsValue::from_str(&stamp));
        let local = String::from(date.to_locale_string("default", &JsValue::UNDEFINED));
        html.set_text_content(Some(&local));
    }
}
