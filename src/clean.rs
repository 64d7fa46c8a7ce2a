use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[a-zA-Z][^<>]*>").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").unwrap());
static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)@[\w.-]+").unwrap());
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Which optional strippers run before scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanOptions {
    pub strip_urls: bool,
    pub strip_mentions: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            strip_urls: true,
            strip_mentions: true,
        }
    }
}

/// Normalize one comment for scoring.
///
/// Every pass either shortens the text or only rewrites whitespace, so
/// iterating to a fixed point terminates, and the result is a fixed point:
/// `clean_text(&clean_text(x, o), o) == clean_text(x, o)`.
pub fn clean_text(text: &str, opts: &CleanOptions) -> String {
    let mut current = clean_pass(text, opts);
    loop {
        let next = clean_pass(&current, opts);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_pass(text: &str, opts: &CleanOptions) -> String {
    let decoded = html_escape::decode_html_entities(text);
    let mut out = TAG_RE.replace_all(&decoded, " ").into_owned();
    if opts.strip_urls {
        out = URL_RE.replace_all(&out, " ").into_owned();
    }
    if opts.strip_mentions {
        out = MENTION_RE.replace_all(&out, " ").into_owned();
    }
    SPACE_RE.replace_all(out.trim(), " ").into_owned()
}

/// Clean every comment text, keeping order
pub fn clean_all<'a, I>(texts: I, opts: &CleanOptions) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    texts.into_iter().map(|t| clean_text(t, opts)).collect()
}
