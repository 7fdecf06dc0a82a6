use crate::error::{Error, Result};

const MAX_VIDEO_ID_LEN: usize = 128;
const WATCH_BASE: &str = "https://www.youtube.com/watch?v=";
const EMBED_BASE: &str = "https://www.youtube.com/embed/";

/// A parsed YouTube video. Only the id is kept; every URL is rebuilt from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub id: String,
}

impl VideoRef {
    pub fn parse(input: &str) -> Option<Self> {
        extract_video_id(input).map(|id| Self { id })
    }

    /// Canonical `watch?v=` URL. The backend only understands this shape.
    pub fn watch_url(&self) -> String {
        format!("{WATCH_BASE}{}", self.id)
    }

    pub fn watch_url_at(&self, seconds: u32) -> String {
        format!("{WATCH_BASE}{}&t={seconds}s", self.id)
    }

    pub fn embed_url(&self, start: u32) -> String {
        format!("{EMBED_BASE}{}?start={start}&autoplay=1", self.id)
    }
}

pub fn extract_video_id(url: &str) -> Option<String> {
    let url = url.trim();

    // Extract video ID from various YouTube URL formats
    let raw_id = if let Some(v_param) = query_param(url, "v") {
        v_param
    } else if let Some(rest) = url.split("youtu.be/").nth(1) {
        path_segment(rest)
    } else if let Some(rest) = ["/embed/", "/shorts/", "/live/"]
        .iter()
        .find_map(|marker| url.split(marker).nth(1))
    {
        path_segment(rest)
    } else {
        url
    };

    sanitize_video_id(raw_id).ok()
}

fn query_param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next().unwrap_or(query);
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}

fn path_segment(rest: &str) -> &str {
    rest.split(['?', '&', '#', '/']).next().unwrap_or(rest)
}

/// Ensure a video identifier is safe for downstream use (file names, URLs).
/// Only ASCII alphanumeric characters plus `_` and `-` are allowed.
pub fn sanitize_video_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(Error::custom("Video ID cannot be empty"));
    }

    if trimmed.len() > MAX_VIDEO_ID_LEN {
        return Err(Error::custom("Video ID is unexpectedly long"));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
    {
        return Err(Error::custom(
            "Video ID contains unsupported characters; expected only letters, numbers, '-' or '_'",
        ));
    }

    Ok(trimmed.to_string())
}
