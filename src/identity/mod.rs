use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use uuid::Uuid;

/// Number of hex characters kept from the name-based UUID.
const IDENTIFIER_LEN: usize = 16;

/// Stable, filesystem-safe key derived from a URL or video ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentIdentifier(String);

impl ContentIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the content identifier for an arbitrary string.
///
/// Uses a UUIDv5 in the URL namespace, truncated to 16 lowercase hex characters,
/// so the value is identical across runs and hosts.
pub fn identify(input: &str) -> ContentIdentifier {
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_URL, input.as_bytes());
    let mut hex = uuid.simple().to_string();
    hex.truncate(IDENTIFIER_LEN);
    ContentIdentifier(hex)
}

/// Identifier for a submitted URL: keyed on the canonical video ID when the URL
/// matches a known hosting pattern, otherwise on the raw URL string.
pub fn content_id_for_url(url: &str) -> ContentIdentifier {
    match canonical_video_id(url) {
        Some(video_id) => identify(&video_id),
        None => identify(url),
    }
}

fn is_youtube_host(host: &str) -> bool {
    let h = host.to_ascii_lowercase();
    h == "youtube.com"
        || h == "youtu.be"
        || h == "youtube-nocookie.com"
        || h.ends_with(".youtube.com")
        || h.ends_with(".youtube-nocookie.com")
}

fn is_valid_video_id(id: &str) -> bool {
    id.len() == 11 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract the 11-character video ID from the URL shapes YouTube serves:
/// `watch?v=`, `youtu.be/<id>`, `/embed/`, `/shorts/`, `/live/` and `/v/`.
pub fn canonical_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    if !is_youtube_host(host) {
        return None;
    }

    let candidate = if host.eq_ignore_ascii_case("youtu.be") {
        parsed.path_segments()?.next().map(str::to_string)
    } else if parsed.path() == "/watch" {
        parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
    } else {
        let mut segments = parsed.path_segments()?;
        match (segments.next(), segments.next()) {
            (Some("embed" | "shorts" | "live" | "v"), Some(id)) => Some(id.to_string()),
            _ => None,
        }
    };

    candidate.filter(|id| is_valid_video_id(id))
}
