//! Media id extraction

use once_cell::sync::Lazy;
use regex::Regex;

/// Watch, short-link, embed and `/v/` URLs, with or without scheme and `www.`
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:https?://)?(?:www\.)?(?:youtube\.com/(?:[^/\n\s]+/\S+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([a-zA-Z0-9_-]{11})",
    )
    .expect("static regex")
});

/// A bare id with nothing around it
static BARE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static regex"));

/// Pull the 11-character media id out of a reference
///
/// Accepts a bare id or any common URL shape. Returns `None` when no id is
/// found.
pub fn extract_video_id(reference: &str) -> Option<String> {
    let reference = reference.trim();
    if BARE_ID.is_match(reference) {
        return Some(reference.to_string());
    }

    URL_PATTERN
        .captures(reference)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
