//! Same-origin request wrapper for the navigation engine.
//!
//! Every navigation attempt funnels through here and comes back as exactly
//! one [`NavigationResult`]; the caller never sees a raw response or an
//! unhandled rejection.

use serde::Deserialize;

/// Flash-message severity, keyed by the `status` field of a JSON response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastStatus {
    Success,
    Failure,
}

/// Outcome of one navigation attempt. Produced per request, never stored.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationResult {
    /// A full HTML document to swap in, recorded under its final
    /// (post-redirect) URL.
    Page { html: String, url: String },
    /// A JSON flash response; the rendered page is left untouched.
    Toast {
        status: ToastStatus,
        messages: Vec<String>,
    },
    /// A non-2xx body, to be written verbatim over the whole document.
    ErrorPage { html: String },
    /// The request or its body never arrived; fall back to a full reload.
    Reload,
}

#[derive(Debug, Deserialize)]
struct ToastPayload {
    status: String,
    messages: Vec<String>,
}

/// Sort a completed response into a [`NavigationResult`].
///
/// Kept free of browser types so the dispatch rules are testable anywhere.
pub fn classify(
    status: u16,
    content_type: Option<&str>,
    body: String,
    url: String,
) -> NavigationResult {
    if !(200..300).contains(&status) {
        return NavigationResult::ErrorPage { html: body };
    }

    if content_type.map(media_type_is_json).unwrap_or(false) {
        return match serde_json::from_str::<ToastPayload>(&body) {
            Ok(payload) => NavigationResult::Toast {
                status: if payload.status == "success" {
                    ToastStatus::Success
                } else {
                    ToastStatus::Failure
                },
                messages: payload.messages,
            },
            Err(_) => NavigationResult::Reload,
        };
    }

    NavigationResult::Page { html: body, url }
}

fn media_type_is_json(content_type: &str) -> bool {
    content_type.split(';').next().map(str::trim) == Some("application/json")
}

#[cfg(target_arch = "wasm32")]
mod web {
    use gloo_net::http::{Request, Response};
    use wasm_bindgen::JsCast;
    use web_sys::{FormData, Url};

    use super::{classify, NavigationResult};

    /// GET a same-origin page, following redirects.
    pub async fn fetch_page(url: &str) -> NavigationResult {
        match Request::get(url).send().await {
            Ok(response) => read(response).await,
            Err(_) => NavigationResult::Reload,
        }
    }

    /// Submit a form with its declared method. A `post` form carries its
    /// fields as the request body; anything else folds them into the query
    /// string, the way a native form submission would.
    pub async fn submit_form(url: &str, method: &str, fields: FormData) -> NavigationResult {
        let sent = if method.eq_ignore_ascii_case("post") {
            match Request::post(url).body(fields) {
                Ok(request) => request.send().await,
                Err(_) => return NavigationResult::Reload,
            }
        } else {
            match url_with_fields(url, &fields) {
                Some(target) => Request::get(&target).send().await,
                None => return NavigationResult::Reload,
            }
        };
        match sent {
            Ok(response) => read(response).await,
            Err(_) => NavigationResult::Reload,
        }
    }

    /// Append the form's text fields to the target's query string. File
    /// entries have no query representation and are skipped.
    fn url_with_fields(url: &str, fields: &FormData) -> Option<String> {
        let target = Url::new(url).ok()?;
        let params = target.search_params();
        let entries = js_sys::try_iter(fields).ok()??;
        for entry in entries {
            let Ok(entry) = entry else {
                return None;
            };
            let pair: js_sys::Array = entry.dyn_into().ok()?;
            let Some(key) = pair.get(0).as_string() else {
                continue;
            };
            let Some(value) = pair.get(1).as_string() else {
                continue;
            };
            params.append(&key, &value);
        }
        Some(target.href())
    }

    async fn read(response: Response) -> NavigationResult {
        let status = response.status();
        let content_type = response.headers().get("content-type");
        let url = response.url();
        match response.text().await {
            Ok(body) => classify(status, content_type.as_deref(), body, url),
            Err(_) => NavigationResult::Reload,
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub(crate) use web::{fetch_page, submit_form};

#[cfg(test)]
mod tests {
    use super::*;

    fn page(status: u16, content_type: Option<&str>, body: &str) -> NavigationResult {
        classify(status, content_type, body.to_string(), "https://site.test/x".to_string())
    }

    #[test]
    fn success_html_becomes_a_page_under_its_final_url() {
        let result = classify(
            200,
            Some("text/html; charset=utf-8"),
            "<html><title>hi</title></html>".to_string(),
            "https://site.test/after-redirect".to_string(),
        );
        assert_eq!(
            result,
            NavigationResult::Page {
                html: "<html><title>hi</title></html>".to_string(),
                url: "https://site.test/after-redirect".to_string(),
            }
        );
    }

    #[test]
    fn missing_content_type_still_renders_as_a_page() {
        assert!(matches!(page(200, None, "<html/>"), NavigationResult::Page { .. }));
    }

    #[test]
    fn json_success_becomes_a_success_toast() {
        let result = page(
            200,
            Some("application/json"),
            r#"{"status": "success", "messages": ["Saved", "extra"]}"#,
        );
        assert_eq!(
            result,
            NavigationResult::Toast {
                status: ToastStatus::Success,
                messages: vec!["Saved".to_string(), "extra".to_string()],
            }
        );
    }

    #[test]
    fn json_with_any_other_status_is_a_failure_toast() {
        let result = page(
            200,
            Some("application/json; charset=utf-8"),
            r#"{"status": "error", "messages": ["x"]}"#,
        );
        assert_eq!(
            result,
            NavigationResult::Toast {
                status: ToastStatus::Failure,
                messages: vec!["x".to_string()],
            }
        );
    }

    #[test]
    fn unreadable_json_falls_back_to_a_reload() {
        assert_eq!(page(200, Some("application/json"), "not json"), NavigationResult::Reload);
        assert_eq!(
            page(200, Some("application/json"), r#"{"messages": "wrong shape"}"#),
            NavigationResult::Reload
        );
    }

    #[test]
    fn non_2xx_is_rendered_verbatim_even_when_json() {
        // Server error pages surface as-is; the status wins over the body type.
        let result = page(500, Some("application/json"), r#"{"status": "error"}"#);
        assert_eq!(
            result,
            NavigationResult::ErrorPage { html: r#"{"status": "error"}"#.to_string() }
        );
        let result = page(404, Some("text/html"), "<html>not found</html>");
        assert_eq!(
            result,
            NavigationResult::ErrorPage { html: "<html>not found</html>".to_string() }
        );
    }

    #[test]
    fn the_whole_2xx_range_counts_as_success() {
        assert!(matches!(page(204, Some("text/html"), ""), NavigationResult::Page { .. }));
        assert!(matches!(page(299, Some("text/html"), "x"), NavigationResult::Page { .. }));
        assert!(matches!(page(300, Some("text/html"), "x"), NavigationResult::ErrorPage { .. }));
        assert!(matches!(page(199, Some("text/html"), "x"), NavigationResult::ErrorPage { .. }));
    }
}
