//! The track queue: an ordered snapshot of the songs visible on the current
//! page, plus the index the player is parked on.

use serde::Deserialize;

/// One playable song, read from a track element's `data-song` payload.
///
/// Tracks are immutable once parsed; the queue only ever moves its index.
#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    #[serde(rename = "userid")]
    pub owner_id: i64,
    #[serde(rename = "songid")]
    pub track_id: i64,
    pub title: String,
    #[serde(rename = "username")]
    pub owner_name: String,
    #[serde(rename = "user_has_pfp", default)]
    pub owner_has_avatar: bool,
    #[serde(default)]
    collaborators: Vec<String>,
}

/// A credited collaborator. Payload names starting with `@` refer to site
/// users and render as profile links; anything else is plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collaborator {
    pub linked: bool,
    pub name: String,
}

impl Track {
    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Streaming endpoint for this track's audio.
    pub fn stream_url(&self) -> String {
        format!("/song/{}/{}", self.owner_id, self.track_id)
    }

    /// The track's own page.
    pub fn view_url(&self) -> String {
        format!("/song/{}/{}?action=view", self.owner_id, self.track_id)
    }

    pub fn owner_url(&self) -> String {
        format!("/users/{}", self.owner_name)
    }

    pub fn avatar_url(&self) -> String {
        format!("/pfp/{}", self.owner_id)
    }

    /// Collaborators in credit order, with the `@` marker already resolved.
    pub fn collaborators(&self) -> impl Iterator<Item = Collaborator> + '_ {
        self.collaborators
            .iter()
            .map(|raw| match raw.strip_prefix('@') {
                Some(name) => Collaborator {
                    linked: true,
                    name: name.to_string(),
                },
                None => Collaborator {
                    linked: false,
                    name: raw.clone(),
                },
            })
    }
}

/// Ordered queue of the tracks on the current page.
///
/// Entries are positional: two identical payloads occupy distinct slots.
/// Rebuilt wholesale on every content swap; nothing else mutates the track
/// list, only the index moves.
#[derive(Debug, Default)]
pub struct Queue {
    tracks: Vec<Track>,
    index: usize,
}

impl Queue {
    /// Replace the queue contents and park the index back at the front.
    pub fn rebuild(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.index = 0;
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.index)
    }

    /// Jump to a track by position. Out-of-range positions are ignored.
    pub fn select(&mut self, index: usize) -> Option<&Track> {
        if index >= self.tracks.len() {
            return None;
        }
        self.index = index;
        self.current()
    }

    /// Move to the next track, wrapping to the front past the end.
    pub fn advance(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        self.index = (self.index + 1) % self.tracks.len();
        self.current()
    }

    /// Move to the previous track, wrapping to the back before the front.
    pub fn retreat(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        self.index = if self.index == 0 {
            self.tracks.len() - 1
        } else {
            self.index - 1
        };
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str) -> Track {
        Track::from_payload(&format!(
            r#"{{"userid": 7, "songid": 42, "title": "{title}", "username": "wren", "user_has_pfp": false, "collaborators": []}}"#
        ))
        .unwrap()
    }

    fn queue_of(n: usize) -> Queue {
        let mut queue = Queue::default();
        queue.rebuild((0..n).map(|i| track(&format!("t{i}"))).collect());
        queue
    }

    #[test]
    fn parses_the_wire_payload() {
        // The server serializes its whole song record; fields the player
        // does not need are skipped.
        let track = Track::from_payload(
            r#"{"userid": 3, "songid": 19, "threadid": 88, "title": "night bus",
                "username": "ada", "description": "late one", "created": "2025-05-01 10:00:00",
                "tags": ["ambient"], "user_has_pfp": true,
                "collaborators": ["@finch", "the street choir"]}"#,
        )
        .unwrap();
        assert_eq!(track.owner_id, 3);
        assert_eq!(track.track_id, 19);
        assert_eq!(track.title, "night bus");
        assert_eq!(track.owner_name, "ada");
        assert!(track.owner_has_avatar);
        assert_eq!(track.stream_url(), "/song/3/19");
        assert_eq!(track.view_url(), "/song/3/19?action=view");
        assert_eq!(track.owner_url(), "/users/ada");
        assert_eq!(track.avatar_url(), "/pfp/3");
    }

    #[test]
    fn payload_without_optional_fields_still_parses() {
        let track = Track::from_payload(
            r#"{"userid": 1, "songid": 2, "title": "loop", "username": "kit"}"#,
        )
        .unwrap();
        assert!(!track.owner_has_avatar);
        assert_eq!(track.collaborators().count(), 0);
    }

    #[test]
    fn garbage_payload_is_an_error() {
        assert!(Track::from_payload("not json").is_err());
        assert!(Track::from_payload(r#"{"userid": "three"}"#).is_err());
    }

    #[test]
    fn collaborator_marker_resolves_in_order() {
        let track = Track::from_payload(
            r#"{"userid": 1, "songid": 1, "title": "x", "username": "a",
                "collaborators": ["@finch", "the street choir", "@ada"]}"#,
        )
        .unwrap();
        let collabs: Vec<Collaborator> = track.collaborators().collect();
        assert_eq!(
            collabs,
            vec![
                Collaborator { linked: true, name: "finch".into() },
                Collaborator { linked: false, name: "the street choir".into() },
                Collaborator { linked: true, name: "ada".into() },
            ]
        );
    }

    #[test]
    fn advancing_len_times_is_the_identity() {
        for len in 1..6 {
            for start in 0..len {
                let mut queue = queue_of(len);
                queue.select(start);
                for _ in 0..len {
                    queue.advance();
                }
                assert_eq!(queue.index(), start, "len={len} start={start}");
            }
        }
    }

    #[test]
    fn retreat_is_the_inverse_of_advance() {
        for len in 1..6 {
            for start in 0..len {
                let mut queue = queue_of(len);
                queue.select(start);
                queue.advance();
                queue.retreat();
                assert_eq!(queue.index(), start, "len={len} start={start}");
            }
        }
    }

    #[test]
    fn retreat_from_the_front_wraps_to_the_back() {
        let mut queue = queue_of(4);
        assert_eq!(queue.index(), 0);
        queue.retreat();
        assert_eq!(queue.index(), 3);
    }

    #[test]
    fn advance_past_the_end_wraps_to_the_front() {
        let mut queue = queue_of(3);
        queue.select(2);
        queue.advance();
        assert_eq!(queue.index(), 0);
        queue.advance();
        assert_eq!(queue.index(), 1);
    }

    #[test]
    fn identical_payloads_are_distinct_entries() {
        let mut queue = Queue::default();
        queue.rebuild(vec![track("same"), track("same"), track("same")]);
        queue.select(1);
        assert_eq!(queue.index(), 1);
        queue.advance();
        assert_eq!(queue.index(), 2);
    }

    #[test]
    fn empty_queue_has_no_motion() {
        let mut queue = Queue::default();
        assert!(queue.advance().is_none());
        assert!(queue.retreat().is_none());
        assert!(queue.select(0).is_none());
        assert!(queue.current().is_none());
    }

    #[test]
    fn rebuild_resets_the_index() {
        let mut queue = queue_of(5);
        queue.select(4);
        queue.rebuild(vec![track("only")]);
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.len(), 1);
    }
}
