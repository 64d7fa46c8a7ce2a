use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde::Serialize;
use vader_sentiment::SentimentIntensityAnalyzer;

static NEGATORS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "not", "no", "never", "nothing", "nobody", "neither", "nor", "hardly", "without", "dont", "don't",
        "isnt", "isn't", "wasnt", "wasn't", "cant", "can't", "wont", "won't", "doesnt", "doesn't", "didnt",
        "didn't", "aint", "ain't",
    ]
    .into_iter()
    .collect()
});

// Polarity of a word following a negator is multiplied by this
const NEGATION_SCALAR: f64 = -0.5;

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Scores one text in `[-1, 1]`
pub trait SentimentScorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, text: &str) -> f64;

    fn analyze(&self, texts: &[String]) -> SentimentReport {
        SentimentReport::from_scores(texts.iter().map(|t| self.score(t)))
    }
}

/// VADER compound score over the whole comment
pub struct VaderScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl VaderScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentScorer for VaderScorer {
    fn name(&self) -> &'static str {
        "vader"
    }

    fn score(&self, text: &str) -> f64 {
        compound(&self.analyzer, text)
    }
}

fn compound(analyzer: &SentimentIntensityAnalyzer<'_>, text: &str) -> f64 {
    analyzer
        .polarity_scores(text)
        .get("compound")
        .copied()
        .unwrap_or(0.0)
        .clamp(-1.0, 1.0)
}

/// Mean polarity of the sentiment-bearing words, each looked up on its own
/// in the VADER lexicon; a preceding negator within three tokens flips and
/// halves a word
pub struct PolarityScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl PolarityScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for PolarityScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentScorer for PolarityScorer {
    fn name(&self) -> &'static str {
        "textblob"
    }

    fn score(&self, text: &str) -> f64 {
        let tokens = tokenize(text);
        let mut matched = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            if NEGATORS.contains(token.as_str()) {
                continue;
            }
            let mut polarity = compound(&self.analyzer, token);
            if polarity == 0.0 {
                continue;
            }
            if tokens[i.saturating_sub(3)..i].iter().any(|t| NEGATORS.contains(t.as_str())) {
                polarity *= NEGATION_SCALAR;
            }
            matched.push(polarity);
        }
        if matched.is_empty() {
            return 0.0;
        }
        (matched.iter().sum::<f64>() / matched.len() as f64).clamp(-1.0, 1.0)
    }
}

/// Percentage of comments per band
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentBreakdown {
    pub spositive: f64,
    pub positive: f64,
    pub wpositive: f64,
    pub neutral: f64,
    pub wnegative: f64,
    pub negative: f64,
    pub snegative: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentReport {
    /// Mean score across comments
    pub overall: f64,
    pub breakdown: SentimentBreakdown,
}

impl SentimentReport {
    pub fn from_scores<I: IntoIterator<Item = f64>>(scores: I) -> Self {
        let mut counts = [0usize; 7];
        let mut total = 0usize;
        let mut sum = 0.0;

        for score in scores {
            total += 1;
            sum += score;
            let band = match score {
                s if s > 0.6 => 0,
                s if s > 0.3 => 1,
                s if s > 0.05 => 2,
                s if s >= -0.05 => 3,
                s if s >= -0.3 => 4,
                s if s >= -0.6 => 5,
                _ => 6,
            };
            counts[band] += 1;
        }

        if total == 0 {
            return Self::default();
        }

        let pct = |n: usize| round2(n as f64 * 100.0 / total as f64);
        Self {
            overall: sum / total as f64,
            breakdown: SentimentBreakdown {
                spositive: pct(counts[0]),
                positive: pct(counts[1]),
                wpositive: pct(counts[2]),
                neutral: pct(counts[3]),
                wnegative: pct(counts[4]),
                negative: pct(counts[5]),
                snegative: pct(counts[6]),
            },
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
