//! Flash-message overlay with a single shared countdown.

use std::cell::RefCell;

use gloo_timers::callback::Timeout;

use crate::fetcher::ToastStatus;

const HIDE_DELAY_MS: u32 = 5_000;

thread_local! {
    static HIDE_TIMER: RefCell<Option<Timeout>> = RefCell::new(None);
}

/// Show the first message for five seconds. A newer message restarts the
/// countdown rather than queuing, so back-to-back toasts only ever show the
/// most recent one for the remaining window.
pub(crate) fn show(status: ToastStatus, messages: &[String]) {
    let Some(message) = messages.first() else {
        return;
    };
    let Some(container) = crate::dom::html_by_id("message-box") else {
        return;
    };

    container.set_text_content(Some(message));
    let color = match status {
        ToastStatus::Success => "var(--blue)",
        ToastStatus::Failure => "red",
    };
    let _ = container.style().set_property("border-color", color);
    container.set_hidden(false);

    HIDE_TIMER.with(|slot| {
        let timeout = Timeout::new(HIDE_DELAY_MS, move || {
            container.set_hidden(true);
        });
        // Dropping the previous handle cancels its countdown.
        *slot.borrow_mut() = Some(timeout);
    });
}
