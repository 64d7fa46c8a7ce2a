use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use log::{error, info};
use serde::Serialize;
use thiserror::Error;

use crate::clean::{CleanOptions, clean_all};
use crate::config::Config;
use crate::emoji::{self, EmojiCount};
use crate::fetcher::{FetchOptions, fetch_comments};
use crate::sentiment::{PolarityScorer, SentimentReport, SentimentScorer, VaderScorer};
use crate::summarize::{AiReport, LlmReporter, ReportGenerator, ReportKind};
use crate::toxicity::{self, ToxicityAnalyzer, ToxicityScore, filter_toxic};
use crate::youtube::{CommentSource, FetchError, YouTubeClient};
use crate::{Comment, extract_video_id};

/// Default number of most-liked comments reported
pub const DEFAULT_TOP_LIKED: usize = 10;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid YouTube URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Tunables for one `Analyzer`
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub fetch: FetchOptions,
    pub cleaning: CleanOptions,
    pub toxicity_threshold: f64,
    pub toxicity_timeout: Duration,
    pub report_timeout: Duration,
    pub top_emojis: usize,
    pub top_liked: usize,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl AnalyzerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fetch: config.youtube.fetch_options(),
            cleaning: config.cleaning,
            toxicity_threshold: config.toxicity.threshold,
            toxicity_timeout: Duration::from_secs(config.toxicity.timeout_secs),
            report_timeout: Duration::from_secs(config.report.timeout_secs),
            top_emojis: emoji::DEFAULT_TOP_N,
            top_liked: DEFAULT_TOP_LIKED,
        }
    }
}

/// Elapsed seconds per pipeline stage
#[derive(Debug, Clone, Default, Serialize)]
pub struct Timings(BTreeMap<String, f64>);

impl Timings {
    fn record(&mut self, stage: impl Into<String>, elapsed: Duration) {
        self.0.insert(stage.into(), elapsed.as_secs_f64());
    }

    pub fn get(&self, stage: &str) -> Option<f64> {
        self.0.get(stage).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToxicitySection {
    pub backend: String,
    pub threshold: f64,
    #[serde(rename = "bert")]
    pub comments: Vec<ToxicityScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub video_id: String,
    pub total_comments: usize,
    pub sentiment: BTreeMap<String, SentimentReport>,
    pub toxicity: ToxicitySection,
    pub emojis: Vec<EmojiCount>,
    pub top_liked: Vec<Comment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_analysis: Option<AiReport>,
    pub time_complexity: Timings,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiReportResponse {
    pub video_id: String,
    pub total_comments: usize,
    pub gemini_analysis: AiReport,
    pub time_complexity: Timings,
}

/// Most-liked comments first; ties keep fetch order. Comments with no text
/// left after cleaning are skipped.
pub fn top_liked(comments: &[Comment], n: usize) -> Vec<Comment> {
    let mut ranked: Vec<Comment> = comments.iter().filter(|c| !c.text.is_empty()).cloned().collect();
    ranked.sort_by(|a, b| b.like_count.cmp(&a.like_count));
    ranked.truncate(n);
    ranked
}

/// Shared, immutable analysis pipeline. Every call builds its own comment
/// list, so one `Analyzer` can serve concurrent requests.
pub struct Analyzer {
    source: Arc<dyn CommentSource>,
    toxicity: Arc<dyn ToxicityAnalyzer>,
    reporter: Arc<dyn ReportGenerator>,
    scorers: Vec<Box<dyn SentimentScorer>>,
    settings: AnalyzerSettings,
}

impl Analyzer {
    pub fn new(
        source: Arc<dyn CommentSource>,
        toxicity: Arc<dyn ToxicityAnalyzer>,
        reporter: Arc<dyn ReportGenerator>,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            source,
            toxicity,
            reporter,
            scorers: vec![Box::new(VaderScorer::new()), Box::new(PolarityScorer::new())],
            settings,
        }
    }

    /// Wire up the live YouTube, toxicity and LLM clients
    pub fn from_config(config: &Config) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ytca/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let source = YouTubeClient::from_env(client.clone()).wrap_err("cannot create YouTube client")?;
        let toxicity = toxicity::from_config(&config.toxicity, client.clone())?;
        let reporter = LlmReporter::new(client, config.report.model.clone());

        Ok(Self::new(
            Arc::new(source),
            toxicity,
            Arc::new(reporter),
            AnalyzerSettings::from_config(config),
        ))
    }

    /// Fetch and clean comments, recording both stages
    async fn collect(
        &self,
        video_url: &str,
        limit: i64,
        timings: &mut Timings,
    ) -> Result<(String, Vec<Comment>, Vec<String>), AnalysisError> {
        let video_id = extract_video_id(video_url).ok_or_else(|| AnalysisError::InvalidUrl(video_url.to_string()))?;

        let start = Instant::now();
        let comments = fetch_comments(self.source.as_ref(), &video_id, limit, &self.settings.fetch).await?;
        timings.record("fetch_comments", start.elapsed());

        let start = Instant::now();
        let cleaned = clean_all(comments.iter().map(|c| c.text.as_str()), &self.settings.cleaning);
        timings.record("clean_comments", start.elapsed());

        Ok((video_id, comments, cleaned))
    }

    /// Full analysis of up to `limit` comments
    pub async fn analyze(
        &self,
        video_url: &str,
        limit: i64,
        include_ai: bool,
    ) -> Result<AnalysisReport, AnalysisError> {
        let mut timings = Timings::default();
        let (video_id, comments, cleaned) = self.collect(video_url, limit, &mut timings).await?;
        info!("Analyzing {} comments for {video_id}", cleaned.len());

        let sentiment = async {
            let mut reports = BTreeMap::new();
            let mut elapsed = Vec::new();
            for scorer in &self.scorers {
                let start = Instant::now();
                reports.insert(scorer.name().to_string(), scorer.analyze(&cleaned));
                elapsed.push((format!("sentiment_{}", scorer.name()), start.elapsed()));
            }
            (reports, elapsed)
        };
        let toxicity = timed(self.score_toxicity(&cleaned));
        let ai = async {
            if include_ai {
                let (report, elapsed) = timed(self.generate_reports(&cleaned)).await;
                Some((report, elapsed))
            } else {
                None
            }
        };
        let emojis = timed(async {
            emoji::top_emojis(comments.iter().map(|c| c.text.as_str()), self.settings.top_emojis)
        });

        let ((sentiment, sentiment_elapsed), (toxicity, toxicity_elapsed), ai, (emojis, emoji_elapsed)) =
            tokio::join!(sentiment, toxicity, ai, emojis);

        for (stage, elapsed) in sentiment_elapsed {
            timings.record(stage, elapsed);
        }
        timings.record(format!("toxicity_{}", toxicity.backend), toxicity_elapsed);
        timings.record("emojis", emoji_elapsed);

        let start = Instant::now();
        let cleaned_comments: Vec<Comment> = comments
            .iter()
            .zip(&cleaned)
            .map(|(raw, text)| Comment::new(text.clone(), raw.like_count))
            .collect();
        let top_liked = top_liked(&cleaned_comments, self.settings.top_liked);
        timings.record("top_liked", start.elapsed());

        let gemini_analysis = ai.map(|(report, elapsed)| {
            timings.record("ai_report", elapsed);
            report
        });

        Ok(AnalysisReport {
            video_id,
            total_comments: cleaned.len(),
            sentiment,
            toxicity,
            emojis,
            top_liked,
            gemini_analysis,
            time_complexity: timings,
        })
    }

    /// Generated reports only
    pub async fn ai_report(&self, video_url: &str, limit: i64) -> Result<AiReportResponse, AnalysisError> {
        let mut timings = Timings::default();
        let (video_id, _, cleaned) = self.collect(video_url, limit, &mut timings).await?;

        let (report, elapsed) = timed(self.generate_reports(&cleaned)).await;
        timings.record("ai_report", elapsed);

        Ok(AiReportResponse {
            video_id,
            total_comments: cleaned.len(),
            gemini_analysis: report,
            time_complexity: timings,
        })
    }

    async fn score_toxicity(&self, cleaned: &[String]) -> ToxicitySection {
        let backend = self.toxicity.name().to_string();
        let threshold = self.settings.toxicity_threshold;

        let deadline = tokio::time::Instant::now() + self.settings.toxicity_timeout;

        let outcome = self.toxicity.analyze(cleaned, deadline).await;
        if let Some(err) = &outcome.error {
            error!("Toxicity scoring stopped after {} comments: {err}", outcome.scores.len());
        }

        ToxicitySection {
            backend,
            threshold,
            comments: filter_toxic(outcome.scores, threshold),
            error: outcome.error,
        }
    }

    async fn generate_reports(&self, cleaned: &[String]) -> AiReport {
        let mut report = AiReport::default();
        if cleaned.iter().all(|c| c.is_empty()) {
            report.errors.push("no comments to analyze".to_string());
            return report;
        }

        let generate = |kind: ReportKind| async move {
            match tokio::time::timeout(self.settings.report_timeout, self.reporter.generate(kind, cleaned)).await {
                Ok(result) => result,
                Err(_) => Err(eyre::eyre!("timed out after {:?}", self.settings.report_timeout)),
            }
        };

        let [summary, demands, suggestions] = ReportKind::ALL;
        let (a, b, c) = tokio::join!(generate(summary), generate(demands), generate(suggestions));
        for (kind, result) in [(summary, a), (demands, b), (suggestions, c)] {
            if let Err(e) = &result {
                error!("{kind} report failed: {e:#}");
            }
            report.set(kind, result);
        }
        report
    }
}

async fn timed<F: Future>(fut: F) -> (F::Output, Duration) {
    let start = Instant::now();
    let out = fut.await;
    (out, start.elapsed())
}
