//! New-activity polling for the navbar indicator.

use gloo_net::http::Request;
use gloo_timers::callback::Interval;
use serde::Deserialize;
use wasm_bindgen_futures::spawn_local;

const POLL_INTERVAL_MS: u32 = 10_000;

#[derive(Debug, Deserialize)]
struct ActivityStatus {
    new_activity: bool,
}

/// Ask the server whether the signed-in user has unseen activity and flip
/// the indicator accordingly. Signed-out sessions skip the request.
pub(crate) fn check_now() {
    if crate::dom::page_username().is_none() {
        return;
    }
    spawn_local(async {
        let response = match Request::get("/new-activity").send().await {
            Ok(response) => response,
            Err(err) => {
                web_sys::console::warn_1(&format!("activity poll failed: {err}").into());
                return;
            }
        };
        if !response.ok() {
            web_sys::console::warn_1(
                &format!("activity poll returned {}", response.status()).into(),
            );
            return;
        }
        match response.json::<ActivityStatus>().await {
            Ok(status) => {
                if let Some(indicator) = crate::dom::html_by_id("activity-indicator") {
                    indicator.set_hidden(!status.new_activity);
                }
            }
            Err(err) => {
                web_sys::console::warn_1(&format!("activity payload unreadable: {err}").into());
            }
        }
    });
}

/// Poll every ten seconds for as long as the page lives.
pub(crate) fn start_polling() {
    Interval::new(POLL_INTERVAL_MS, check_now).forget();
}
