pub mod analysis;
pub mod clean;
pub mod config;
pub mod emoji;
pub mod fetcher;
pub mod output;
pub mod retry;
pub mod sentiment;
pub mod server;
pub mod summarize;
pub mod toxicity;
pub mod youtube;


use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single top-level comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub like_count: u64,
}

impl Comment {
    pub fn new(text: impl Into<String>, like_count: u64) -> Self {
        Self {
            text: text.into(),
            like_count,
        }
    }
}

static BARE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").unwrap());

static WATCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[/.])youtube(?:-nocookie)?\.com/watch/?\?(?:[^#]*&)?v=([a-zA-Z0-9_-]+)").unwrap()
});

static PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[/.])(?:youtu\.be|youtube(?:-nocookie)?\.com/(?:embed|shorts|live|v))/([a-zA-Z0-9_-]+)").unwrap()
});

/// Extract video ID from various YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    // Bare 11-character video ID
    if BARE_ID_RE.is_match(input) {
        return Some(input.to_string());
    }

    // youtube.com/watch?...v=ID
    if let Some(caps) = WATCH_RE.captures(input) {
        return Some(caps[1].to_string());
    }

    // youtu.be/ID, /embed/ID, /shorts/ID, /live/ID, /v/ID
    PATH_RE.captures(input).map(|caps| caps[1].to_string())
}
