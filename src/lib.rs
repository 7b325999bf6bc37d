//! Client-side runtime for Tunecove.
//!
//! The site is server-rendered, one full HTML document per page. This crate
//! is loaded by every page and layers two behaviors on top: AJAX navigation
//! (in-site links and forms swap the `#main` region instead of reloading)
//! and a persistent audio player that keeps playing across those swaps.
//!
//! Browser-bound modules only exist on wasm32; the data model and the
//! decision logic compile everywhere so they can be tested off-browser.

pub mod fetcher;
pub mod queue;

pub mod session;

#[cfg(target_arch = "wasm32")]
mod activity;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
pub mod lifecycle;
#[cfg(target_arch = "wasm32")]
mod nav;
#[cfg(target_arch = "wasm32")]
mod toast;

pub use fetcher::{NavigationResult, ToastStatus};
pub use queue::{Collaborator, Queue, Track};

#[cfg(target_arch = "wasm32")]
mod boot {
    use wasm_bindgen::prelude::*;

    use crate::{activity, lifecycle, nav, session};

    /// Entry point, run when the module is instantiated (after the
    /// server-rendered document has parsed).
    ///
    /// Singletons are wired here exactly once; everything per-page goes
    /// through the content-ready registry so it reruns on every swap.
    #[wasm_bindgen(start)]
    pub fn start() {
        let player = session::init();

        lifecycle::on_content_ready(nav::bind_document);
        lifecycle::on_content_ready(nav::refresh_login_state);
        lifecycle::on_content_ready(nav::localize_dates);
        lifecycle::on_content_ready(activity::check_now);
        if let Some(player) = player {
            lifecycle::on_content_ready(move || {
                player.apply_volume_slider();
                player.rebuild_queue();
            });
        }

        nav::watch_history();
        activity::start_polling();

        lifecycle::dispatch_content_ready();
    }

    /// Install the palette-swap painter the player consults for transport
    /// icon art. The painter receives an icon name and returns a source
    /// URL, or nothing to leave the image bytes alone.
    #[wasm_bindgen(js_name = setIconPainter)]
    pub fn set_icon_painter(painter: js_sys::Function) {
        if let Some(player) = session::session() {
            player.set_icon_painter(painter);
        }
    }
}
