use std::collections::HashMap;

use serde::Serialize;

/// Default number of emojis reported
pub const DEFAULT_TOP_N: usize = 10;

/// An emoji and how often it appears; serialized as `[emoji, count]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "(String, usize)")]
pub struct EmojiCount {
    pub emoji: char,
    pub count: usize,
}

impl From<EmojiCount> for (String, usize) {
    fn from(e: EmojiCount) -> Self {
        (e.emoji.to_string(), e.count)
    }
}

/// Pictographic code points. Modifiers, joiners and variation selectors are
/// not counted on their own.
pub fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1F3FA
        | 0x1F400..=0x1F64F
        | 0x1F680..=0x1F6FF
        | 0x1F7E0..=0x1F7EB
        | 0x1F90C..=0x1F9FF
        | 0x1FA70..=0x1FAFF
        | 0x1F004
        | 0x1F0CF
        | 0x1F18E
        | 0x1F191..=0x1F19A
        | 0x2600..=0x26FF
        | 0x2700..=0x27BF
        | 0x2B50
        | 0x2B55
        | 0x2764
    )
}

/// Most frequent emojis across `texts`, by count descending then emoji
pub fn top_emojis<'a, I>(texts: I, n: usize) -> Vec<EmojiCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<char, usize> = HashMap::new();
    for text in texts {
        for c in text.chars().filter(|&c| is_emoji(c)) {
            *counts.entry(c).or_default() += 1;
        }
    }

    let mut ranked: Vec<EmojiCount> = counts
        .into_iter()
        .map(|(emoji, count)| EmojiCount { emoji, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.emoji.cmp(&b.emoji)));
    ranked.truncate(n);
    ranked
}
