//! The persistent playback session: one audio element driven from the
//! current queue, mirrored to the big and mini players and the OS media
//! controls.
//!
//! Initialized exactly once per page load; navigation never tears it down,
//! it only re-points the session at a possibly-new queue.

#[cfg(target_arch = "wasm32")]
use std::cell::RefCell;
#[cfg(target_arch = "wasm32")]
use std::rc::Rc;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::closure::Closure;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{JsCast, JsValue};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen_futures::{spawn_local, JsFuture};
#[cfg(target_arch = "wasm32")]
use web_sys::{
    Element, Event, HtmlAudioElement, HtmlElement, HtmlImageElement, HtmlInputElement,
    KeyboardEvent, MediaMetadata, MediaSessionAction,
};

#[cfg(target_arch = "wasm32")]
use crate::queue::{Queue, Track};

/// Render float seconds as `minutes:seconds`. An unloaded duration reports
/// NaN and renders as the zero stamp.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(target_arch = "wasm32")]
thread_local! {
    static SESSION: RefCell<Option<Session>> = RefCell::new(None);
}

/// The process-wide session, present once [`init`] has found the player.
#[cfg(target_arch = "wasm32")]
pub(crate) fn session() -> Option<Session> {
    SESSION.with(|slot| slot.borrow().clone())
}

#[cfg(target_arch = "wasm32")]
#[derive(Clone)]
pub(crate) struct Session {
    inner: Rc<SessionInner>,
}

#[cfg(target_arch = "wasm32")]
struct SessionInner {
    audio: HtmlAudioElement,
    queue: RefCell<Queue>,
    current: RefCell<Option<Track>>,
    icon_painter: RefCell<Option<js_sys::Function>>,
}

/// Wire the persistent player once. Pages without the player chrome get no
/// session and the transport surface stays inert.
#[cfg(target_arch = "wasm32")]
pub(crate) fn init() -> Option<Session> {
    if let Some(existing) = session() {
        return Some(existing);
    }
    let audio = crate::dom::by_id("player-audio")?
        .dyn_into::<HtmlAudioElement>()
        .ok()?;
    let session = Session {
        inner: Rc::new(SessionInner {
            audio,
            queue: RefCell::new(Queue::default()),
            current: RefCell::new(None),
            icon_painter: RefCell::new(None),
        }),
    };
    session.apply_volume_slider();
    session.wire_audio_events();
    session.wire_controls();
    session.wire_scroll_and_keys();
    session.register_media_handlers();
    SESSION.with(|slot| *slot.borrow_mut() = Some(session.clone()));
    Some(session)
}

#[cfg(target_arch = "wasm32")]
impl Session {
    /// Re-scan the rendered page for tracks and rebind their play controls.
    /// A page without a track list keeps the queue that was already playing.
    pub(crate) fn rebuild_queue(&self) {
        let Some(document) = crate::dom::document() else {
            return;
        };
        let rows = document.get_elements_by_class_name("song");
        let mut tracks = Vec::new();
        for i in 0..rows.length() {
            let Some(row) = rows.item(i) else {
                continue;
            };
            let Some(track) = track_from_element(&row) else {
                continue;
            };
            self.bind_play_control(&row, tracks.len());
            tracks.push(track);
        }
        if !tracks.is_empty() {
            self.inner.queue.borrow_mut().rebuild(tracks);
        }
    }

    // Rows live inside the swapped region, so a fresh closure per row never
    // stacks listeners: the old rows are gone along with theirs.
    fn bind_play_control(&self, row: &Element, index: usize) {
        let Ok(Some(control)) = row.query_selector(".song-play") else {
            return;
        };
        let session = self.clone();
        let on_click = Closure::wrap(Box::new(move |event: Event| {
            event.prevent_default();
            event.stop_propagation();
            session.play_at(index);
        }) as Box<dyn FnMut(Event)>);
        let _ = control.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref());
        on_click.forget();
    }

    /// Start playback from a track-list row. Always restores the big player.
    pub(crate) fn play_at(&self, index: usize) {
        let track = self.inner.queue.borrow_mut().select(index).cloned();
        let Some(track) = track else {
            return;
        };
        self.show_big_player();
        self.load_and_play(&track);
    }

    /// Point the audio element at `track`, start it from zero, and refresh
    /// every display surface.
    pub(crate) fn load_and_play(&self, track: &Track) {
        *self.inner.current.borrow_mut() = Some(track.clone());
        let audio = &self.inner.audio;
        let _ = audio.pause();
        audio.set_src(&track.stream_url());
        audio.set_current_time(0.0);
        self.try_play();
        self.refresh_surfaces(track);
        self.update_media_metadata(track);
    }

    /// Flip play/pause. Nothing loaded means nothing to do.
    pub(crate) fn toggle_play_pause(&self) {
        if self.inner.current.borrow().is_none() {
            return;
        }
        let audio = &self.inner.audio;
        if audio.paused() {
            self.try_play();
        } else {
            let _ = audio.pause();
        }
    }

    /// Step to the next queue entry. Wrapping past the end loads the first
    /// track but leaves it paused, as the end-of-queue signal.
    pub(crate) fn next(&self) {
        let (track, wrapped) = {
            let mut queue = self.inner.queue.borrow_mut();
            let track = queue.advance().cloned();
            (track, queue.index() == 0)
        };
        let Some(track) = track else {
            return;
        };
        self.load_and_play(&track);
        if wrapped {
            let _ = self.inner.audio.pause();
        }
    }

    /// Step back one entry; wrapping around to the last track keeps playing.
    pub(crate) fn previous(&self) {
        let track = self.inner.queue.borrow_mut().retreat().cloned();
        let Some(track) = track else {
            return;
        };
        self.load_and_play(&track);
    }

    /// The browser restores slider positions on reload; make the element
    /// agree with whatever the slider currently says.
    pub(crate) fn apply_volume_slider(&self) {
        let Some(slider) = crate::dom::input_by_id("volume-slider") else {
            return;
        };
        if let Ok(volume) = slider.value().parse::<f64>() {
            self.inner.audio.set_volume(volume.clamp(0.0, 1.0));
        }
    }

    /// Install the palette-swap painter consulted for transport icon art.
    pub(crate) fn set_icon_painter(&self, painter: js_sys::Function) {
        *self.inner.icon_painter.borrow_mut() = Some(painter);
    }

    // `play()` hands back a promise; resolve it off the event loop so an
    // autoplay rejection never becomes an unhandled one.
    fn try_play(&self) {
        if let Ok(promise) = self.inner.audio.play() {
            spawn_local(async move {
                let _ = JsFuture::from(promise).await;
            });
        }
    }

    fn wire_audio_events(&self) {
        let audio = &self.inner.audio;

        let progress = self.clone();
        let on_time = Closure::wrap(Box::new(move || progress.update_progress()) as Box<dyn FnMut()>);
        let _ = audio.add_event_listener_with_callback("timeupdate", on_time.as_ref().unchecked_ref());
        on_time.forget();

        let advance = self.clone();
        let on_ended = Closure::wrap(Box::new(move || advance.next()) as Box<dyn FnMut()>);
        let _ = audio.add_event_listener_with_callback("ended", on_ended.as_ref().unchecked_ref());
        on_ended.forget();

        // The element's own events drive the icon, so OS transport controls
        // and the buttons can never disagree.
        let playing = self.clone();
        let on_play = Closure::wrap(Box::new(move || playing.swap_transport_icon("icon-pause")) as Box<dyn FnMut()>);
        let _ = audio.add_event_listener_with_callback("play", on_play.as_ref().unchecked_ref());
        on_play.forget();

        let paused = self.clone();
        let on_pause = Closure::wrap(Box::new(move || paused.swap_transport_icon("icon-play")) as Box<dyn FnMut()>);
        let _ = audio.add_event_listener_with_callback("pause", on_pause.as_ref().unchecked_ref());
        on_pause.forget();
    }

    fn wire_controls(&self) {
        for id in ["play-pause-button", "mini-play-pause-button"] {
            let session = self.clone();
            attach_click(id, move || session.toggle_play_pause());
        }
        {
            let session = self.clone();
            attach_click("next-button", move || session.next());
        }
        {
            let session = self.clone();
            attach_click("previous-button", move || session.previous());
        }

        if let Some(slider) = crate::dom::input_by_id("position-slider") {
            let session = self.clone();
            let on_input = Closure::wrap(Box::new(move |event: Event| {
                let Some(input) = event
                    .target()
                    .and_then(|target| target.dyn_into::<HtmlInputElement>().ok())
                else {
                    return;
                };
                let Ok(fraction) = input.value().parse::<f64>() else {
                    return;
                };
                let audio = &session.inner.audio;
                let duration = audio.duration();
                if duration.is_finite() {
                    audio.set_current_time(duration * fraction);
                }
            }) as Box<dyn FnMut(Event)>);
            let _ = slider.add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref());
            on_input.forget();
        }

        if let Some(slider) = crate::dom::input_by_id("volume-slider") {
            let session = self.clone();
            let on_input = Closure::wrap(Box::new(move |event: Event| {
                let Some(input) = event
                    .target()
                    .and_then(|target| target.dyn_into::<HtmlInputElement>().ok())
                else {
                    return;
                };
                if let Ok(volume) = input.value().parse::<f64>() {
                    session.inner.audio.set_volume(volume.clamp(0.0, 1.0));
                }
            }) as Box<dyn FnMut(Event)>);
            let _ = slider.add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref());
            on_input.forget();
        }
    }

    fn wire_scroll_and_keys(&self) {
        let Some(document) = crate::dom::document() else {
            return;
        };

        let minimize = self.clone();
        let on_scroll = Closure::wrap(Box::new(move || minimize.show_mini_player()) as Box<dyn FnMut()>);
        let _ = document.add_event_listener_with_callback("scroll", on_scroll.as_ref().unchecked_ref());
        on_scroll.forget();

        let seek = self.clone();
        let on_key = Closure::wrap(Box::new(move |event: KeyboardEvent| {
            seek.seek_by_key(&event);
        }) as Box<dyn FnMut(KeyboardEvent)>);
        let _ = document.add_event_listener_with_callback("keydown", on_key.as_ref().unchecked_ref());
        on_key.forget();
    }

    /// Arrow keys nudge the playhead ten seconds either way, unless the
    /// user is typing somewhere.
    fn seek_by_key(&self, event: &KeyboardEvent) {
        if let Some(target) = event
            .target()
            .and_then(|target| target.dyn_into::<Element>().ok())
        {
            let tag = target.tag_name();
            if tag.eq_ignore_ascii_case("input") || tag.eq_ignore_ascii_case("textarea") {
                return;
            }
        }
        let delta = match event.key().as_str() {
            "ArrowLeft" => -10.0,
            "ArrowRight" => 10.0,
            _ => return,
        };
        let audio = &self.inner.audio;
        let duration = audio.duration();
        if !duration.is_finite() {
            return;
        }
        audio.set_current_time((audio.current_time() + delta).clamp(0.0, duration));
    }

    /// Mirror the audio clock into the scrub slider and the time readouts.
    fn update_progress(&self) {
        let audio = &self.inner.audio;
        let duration = audio.duration();
        let progress = if duration.is_finite() && duration > 0.0 {
            audio.current_time() / duration
        } else {
            0.0
        };
        if let Some(slider) = crate::dom::input_by_id("position-slider") {
            slider.set_value(&progress.to_string());
        }
        if let Some(current) = crate::dom::html_by_id("player-current-time") {
            current.set_text_content(Some(&format_time(audio.current_time())));
        }
        if let Some(total) = crate::dom::html_by_id("player-total-time") {
            total.set_text_content(Some(&format_time(duration)));
        }
    }

    fn refresh_surfaces(&self, track: &Track) {
        // Owner avatar doubles as the media-session artwork.
        if let Some(avatar) = image_by_id("player-pfp") {
            if track.owner_has_avatar {
                let _ = avatar.style().set_property("display", "inline-block");
                avatar.set_src(&track.avatar_url());
            } else {
                let _ = avatar.style().set_property("display", "none");
            }
        }
        if let Some(title) = crate::dom::anchor_by_id("player-title") {
            title.set_text_content(Some(&track.title));
            title.set_href(&track.view_url());
        }
        if let Some(separator) = crate::dom::html_by_id("player-info-sep") {
            separator.set_hidden(false);
        }
        if let Some(artist) = crate::dom::anchor_by_id("player-artist") {
            artist.set_text_content(Some(&track.owner_name));
            artist.set_href(&track.owner_url());
            artist.set_hidden(false);
        }
        self.render_collaborators(track);
        self.mirror_to_mini_player(track);
    }

    /// Collaborators render inline after the artist: site users as profile
    /// links, everyone else as plain text.
    fn render_collaborators(&self, track: &Track) {
        let Some(list) = crate::dom::by_id("player-collabs") else {
            return;
        };
        let Some(document) = crate::dom::document() else {
            return;
        };
        list.set_text_content(Some(""));
        for collaborator in track.collaborators() {
            if collaborator.linked {
                let Ok(link) = document.create_element("a") else {
                    continue;
                };
                let _ = link.set_attribute("href", &format!("/users/{}", collaborator.name));
                link.set_class_name("profile-link");
                link.set_text_content(Some(&collaborator.name));
                let _ = list.append_child(&link);
            } else {
                let Ok(span) = document.create_element("span") else {
                    continue;
                };
                span.set_text_content(Some(&format!(" {}", collaborator.name)));
                let _ = list.append_child(&span);
            }
        }
    }

    fn mirror_to_mini_player(&self, track: &Track) {
        if let Some(title) = crate::dom::anchor_by_id("mini-player-title") {
            title.set_text_content(Some(&track.title));
            title.set_href(&track.view_url());
        }
        if let Some(artist) = crate::dom::anchor_by_id("mini-player-artist") {
            artist.set_text_content(Some(&track.owner_name));
            artist.set_href(&track.owner_url());
        }
        if let (Some(mini), Some(full)) = (
            crate::dom::by_id("mini-player-collabs"),
            crate::dom::by_id("player-collabs"),
        ) {
            mini.set_inner_html(&full.inner_html());
        }
    }

    /// The compact player appears on scroll, but only replaces a visible
    /// full player; it never reappears on its own.
    fn show_mini_player(&self) {
        let Some(full) = crate::dom::html_by_id("player") else {
            return;
        };
        if full.hidden() {
            return;
        }
        full.set_hidden(true);
        if let Some(mini) = crate::dom::html_by_id("mini-player") {
            mini.set_hidden(false);
        }
    }

    fn show_big_player(&self) {
        if let Some(mini) = crate::dom::html_by_id("mini-player") {
            mini.set_hidden(true);
        }
        if let Some(full) = crate::dom::html_by_id("player") {
            full.set_hidden(false);
        }
    }

    /// Swap both transport buttons to the given icon, repainting through
    /// the installed palette painter when one exists.
    fn swap_transport_icon(&self, icon: &str) {
        let painter = self.inner.icon_painter.borrow();
        for id in ["play-pause-button", "mini-play-pause-button"] {
            let Some(button) = crate::dom::by_id(id) else {
                continue;
            };
            button.set_class_name(icon);
            let Some(painter) = painter.as_ref() else {
                continue;
            };
            let Ok(src) = painter.call1(&JsValue::NULL, &JsValue::from_str(icon)) else {
                continue;
            };
            let Some(src) = src.as_string() else {
                continue;
            };
            if let Some(image) = button.dyn_ref::<HtmlImageElement>() {
                image.set_src(&src);
            }
        }
    }

    /// Transport handlers are registered once; each delegates to the live
    /// session state when the OS fires it.
    fn register_media_handlers(&self) {
        let Some(media) = media_session() else {
            return;
        };

        let next = self.clone();
        let on_next = Closure::wrap(Box::new(move || next.next()) as Box<dyn FnMut()>);
        media.set_action_handler(
            MediaSessionAction::Nexttrack,
            Some(on_next.as_ref().unchecked_ref()),
        );
        on_next.forget();

        let previous = self.clone();
        let on_previous = Closure::wrap(Box::new(move || previous.previous()) as Box<dyn FnMut()>);
        media.set_action_handler(
            MediaSessionAction::Previoustrack,
            Some(on_previous.as_ref().unchecked_ref()),
        );
        on_previous.forget();

        let play = self.clone();
        let on_play = Closure::wrap(Box::new(move || play.toggle_play_pause()) as Box<dyn FnMut()>);
        media.set_action_handler(
            MediaSessionAction::Play,
            Some(on_play.as_ref().unchecked_ref()),
        );
        on_play.forget();

        let pause = self.clone();
        let on_pause = Closure::wrap(Box::new(move || pause.toggle_play_pause()) as Box<dyn FnMut()>);
        media.set_action_handler(
            MediaSessionAction::Pause,
            Some(on_pause.as_ref().unchecked_ref()),
        );
        on_pause.forget();
    }

    fn update_media_metadata(&self, track: &Track) {
        let Some(media) = media_session() else {
            return;
        };
        let Ok(metadata) = MediaMetadata::new() else {
            return;
        };
        metadata.set_title(&track.title);
        metadata.set_artist(&track.owner_name);
        metadata.set_album("Tunecove");

        let art_src = if track.owner_has_avatar {
            track.avatar_url()
        } else {
            "/static/tunecove-notes.png".to_string()
        };
        let image = js_sys::Object::new();
        let _ = js_sys::Reflect::set(
            image.as_ref(),
            &JsValue::from_str("src"),
            &JsValue::from_str(&art_src),
        );
        let artwork = js_sys::Array::new();
        artwork.push(image.as_ref());
        metadata.set_artwork(artwork.as_ref());

        media.set_metadata(Some(&metadata));
    }
}

/// The platform's media session, where the host exposes one.
#[cfg(target_arch = "wasm32")]
fn media_session() -> Option<web_sys::MediaSession> {
    let window = crate::dom::window()?;
    let navigator = window.navigator();
    let supported = js_sys::Reflect::has(navigator.as_ref(), &JsValue::from_str("mediaSession"))
        .unwrap_or(false);
    if !supported {
        return None;
    }
    Some(navigator.media_session())
}

#[cfg(target_arch = "wasm32")]
fn image_by_id(id: &str) -> Option<HtmlImageElement> {
    crate::dom::by_id(id)?.dyn_into().ok()
}

#[cfg(target_arch = "wasm32")]
fn track_from_element(element: &Element) -> Option<Track> {
    let html: &HtmlElement = element.dyn_ref()?;
    let payload = html.dataset().get("song")?;
    match Track::from_payload(&payload) {
        Ok(track) => Some(track),
        Err(err) => {
            web_sys::console::warn_1(&format!("unreadable song payload: {err}").into());
            None
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn attach_click(id: &str, action: impl Fn() + 'static) {
    let Some(element) = crate::dom::by_id(id) else {
        return;
    };
    let on_click = Closure::wrap(Box::new(move |_event: Event| action()) as Box<dyn FnMut(Event)>);
    let _ = element.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref());
    on_click.forget();
}

#[cfg(test)]
mod tests {
    use super::format_time;

    #[test]
    fn unloaded_duration_formats_as_zero() {
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(0.0), "0:00");
    }

    #[test]
    fn seconds_are_zero_padded() {
        assert_eq!(format_time(7.3), "0:07");
        assert_eq!(format_time(59.99), "0:59");
    }

    #[test]
    fn minutes_accumulate_without_padding() {
        assert_eq!(format_time(60.0), "1:00");
        assert_eq!(format_time(61.0), "1:01");
        assert_eq!(format_time(600.0), "10:00");
        assert_eq!(format_time(3725.5), "62:05");
    }

    #[test]
    fn non_finite_durations_stay_at_zero() {
        assert_eq!(format_time(f64::INFINITY), "0:00");
        assert_eq!(format_time(-3.0), "0:00");
    }
}
