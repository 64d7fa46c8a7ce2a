use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Result, bail, eyre};
use log::{debug, warn};
use serde::Serialize;
use tokio::time::Instant;

use crate::config::{ToxicityBackend, ToxicityConfig};

const PERSPECTIVE_URL: &str = "https://commentanalyzer.googleapis.com/v1alpha1/comments:analyze";

/// Texts per inference request
const CLASSIFIER_BATCH: usize = 32;

/// A comment with its toxicity probability; serialized as `[text, score]`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "(String, f64)")]
pub struct ToxicityScore {
    pub text: String,
    pub score: f64,
}

impl From<ToxicityScore> for (String, f64) {
    fn from(s: ToxicityScore) -> Self {
        (s.text, s.score)
    }
}

/// Scores gathered by one analyzer run, plus why it stopped early if it did
#[derive(Debug, Clone, PartialEq)]
pub struct ToxicityOutcome {
    pub scores: Vec<ToxicityScore>,
    pub error: Option<String>,
}

impl ToxicityOutcome {
    pub fn complete(scores: Vec<ToxicityScore>) -> Self {
        Self { scores, error: None }
    }

    pub fn failed(scores: Vec<ToxicityScore>, error: impl Into<String>) -> Self {
        Self {
            scores,
            error: Some(error.into()),
        }
    }
}

/// Maps comments to toxicity scores in `[0, 1]`.
///
/// Implementations must stop issuing requests once `deadline` passes and
/// return whatever they scored so far together with an error.
#[async_trait]
pub trait ToxicityAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, texts: &[String], deadline: Instant) -> ToxicityOutcome;
}

/// Keep entries scoring at or above `threshold`, in input order
pub fn filter_toxic(scores: Vec<ToxicityScore>, threshold: f64) -> Vec<ToxicityScore> {
    scores.into_iter().filter(|s| s.score >= threshold).collect()
}

/// Build the analyzer selected by configuration
pub fn from_config(cfg: &ToxicityConfig, client: reqwest::Client) -> Result<Arc<dyn ToxicityAnalyzer>> {
    let analyzer: Arc<dyn ToxicityAnalyzer> = match cfg.backend {
        ToxicityBackend::Classifier => Arc::new(ClassifierAnalyzer::new(
            client,
            cfg,
            std::env::var("HF_API_TOKEN").ok(),
        )),
        ToxicityBackend::Perspective => {
            let api_key = std::env::var("PERSPECTIVE_API_KEY").map_err(|_| {
                eyre!("PERSPECTIVE_API_KEY environment variable not set (required for the perspective backend)")
            })?;
            Arc::new(PerspectiveAnalyzer::new(client, api_key))
        }
    };
    Ok(analyzer)
}

/// Pretrained sequence classifier served by a Hugging Face style inference
/// endpoint (`POST {endpoint}/{model}` with `{"inputs": [...]}`)
pub struct ClassifierAnalyzer {
    client: reqwest::Client,
    url: String,
    toxic_label: String,
    token: Option<String>,
}

impl ClassifierAnalyzer {
    pub fn new(client: reqwest::Client, cfg: &ToxicityConfig, token: Option<String>) -> Self {
        Self {
            client,
            url: format!("{}/{}", cfg.endpoint.trim_end_matches('/'), cfg.model),
            toxic_label: cfg.toxic_label.clone(),
            token,
        }
    }

    async fn classify(&self, batch: &[&String]) -> Result<Vec<f64>> {
        debug!("Classifying {} comments via {}", batch.len(), self.url);

        let mut req = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "inputs": batch, "options": { "wait_for_model": true } }));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("inference endpoint returned {status}: {body}");
        }

        let json: serde_json::Value = resp.json().await?;
        parse_classifier_scores(&json, batch.len(), &self.toxic_label)
    }
}

#[async_trait]
impl ToxicityAnalyzer for ClassifierAnalyzer {
    fn name(&self) -> &'static str {
        "classifier"
    }

    async fn analyze(&self, texts: &[String], deadline: Instant) -> ToxicityOutcome {
        let texts: Vec<&String> = texts.iter().filter(|t| !t.is_empty()).collect();
        let mut scores = Vec::with_capacity(texts.len());

        for batch in texts.chunks(CLASSIFIER_BATCH) {
            let probs = match tokio::time::timeout_at(deadline, self.classify(batch)).await {
                Ok(Ok(probs)) => probs,
                Ok(Err(e)) => return ToxicityOutcome::failed(scores, format!("{e:#}")),
                Err(_) => {
                    let msg = format!("timed out after scoring {} of {} comments", scores.len(), texts.len());
                    return ToxicityOutcome::failed(scores, msg);
                }
            };
            scores.extend(batch.iter().zip(probs).map(|(text, score)| ToxicityScore {
                text: (*text).clone(),
                score,
            }));
        }

        ToxicityOutcome::complete(scores)
    }
}

/// Pull the toxic-label probability for each input out of an inference
/// response. A single input may come back as a flat label list.
fn parse_classifier_scores(json: &serde_json::Value, expected: usize, toxic_label: &str) -> Result<Vec<f64>> {
    let rows = json
        .as_array()
        .ok_or_else(|| eyre!("unexpected inference response format: {json}"))?;

    let per_input: Vec<&serde_json::Value> = if rows.first().is_some_and(|r| r.is_object()) {
        vec![json]
    } else {
        rows.iter().collect()
    };

    if per_input.len() != expected {
        bail!("inference response has {} rows for {expected} inputs", per_input.len());
    }

    per_input
        .into_iter()
        .map(|labels| {
            labels
                .as_array()
                .and_then(|labels| {
                    labels.iter().find_map(|l| {
                        let label = l.get("label")?.as_str()?;
                        if label.eq_ignore_ascii_case(toxic_label) || label == "LABEL_1" {
                            l.get("score")?.as_f64()
                        } else {
                            None
                        }
                    })
                })
                .ok_or_else(|| eyre!("label {toxic_label:?} missing from inference response"))
        })
        .collect()
}

/// Hosted moderation API, one request per comment
pub struct PerspectiveAnalyzer {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

impl PerspectiveAnalyzer {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            url: PERSPECTIVE_URL.to_string(),
        }
    }

    /// Point the analyzer at a different `comments:analyze` endpoint
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn score_one(&self, text: &str) -> Result<f64> {
        let body = serde_json::json!({
            "comment": { "text": text },
            "languages": ["en"],
            "requestedAttributes": { "TOXICITY": {} }
        });

        let resp = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Perspective API returned {status}: {body}");
        }

        let json: serde_json::Value = resp.json().await?;
        extract_perspective_score(&json)
    }
}

fn extract_perspective_score(json: &serde_json::Value) -> Result<f64> {
    json.pointer("/attributeScores/TOXICITY/summaryScore/value")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| eyre!("unexpected Perspective API response format"))
}

#[async_trait]
impl ToxicityAnalyzer for PerspectiveAnalyzer {
    fn name(&self) -> &'static str {
        "perspective"
    }

    async fn analyze(&self, texts: &[String], deadline: Instant) -> ToxicityOutcome {
        let texts: Vec<&String> = texts.iter().filter(|t| !t.is_empty()).collect();
        let mut scores = Vec::new();
        let mut last_err = None;

        for text in &texts {
            match tokio::time::timeout_at(deadline, self.score_one(text)).await {
                Ok(Ok(score)) => scores.push(ToxicityScore {
                    text: (*text).clone(),
                    score,
                }),
                Ok(Err(e)) => {
                    warn!("Skipping comment, Perspective scoring failed: {e}");
                    last_err = Some(e);
                }
                Err(_) => {
                    let msg = format!("timed out after scoring {} of {} comments", scores.len(), texts.len());
                    return ToxicityOutcome::failed(scores, msg);
                }
            }
        }

        match last_err {
            Some(e) if scores.is_empty() => {
                ToxicityOutcome::failed(scores, format!("{:#}", e.wrap_err("every Perspective request failed")))
            }
            _ => ToxicityOutcome::complete(scores),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(text: &str, score: f64) -> ToxicityScore {
        ToxicityScore {
            text: text.to_string(),
            score,
        }
    }

    #[test]
    fn test_filter_toxic_threshold() {
        let scores = vec![score("a", 0.2), score("b", 0.4), score("c", 0.6), score("d", 0.9)];
        let kept = filter_toxic(scores, 0.5);
        assert_eq!(kept, vec![score("c", 0.6), score("d", 0.9)]);
    }

    #[test]
    fn test_filter_toxic_is_inclusive() {
        assert_eq!(filter_toxic(vec![score("edge", 0.5)], 0.5).len(), 1);
    }

    #[test]
    fn test_score_serializes_as_pair() {
        let json = serde_json::to_value(score("you fool", 0.75)).unwrap();
        assert_eq!(json, serde_json::json!(["you fool", 0.75]));
    }

    #[test]
    fn test_parse_classifier_batch() {
        let json = serde_json::json!([
            [{"label": "non-offensive", "score": 0.9}, {"label": "offensive", "score": 0.1}],
            [{"label": "offensive", "score": 0.8}, {"label": "non-offensive", "score": 0.2}]
        ]);
        let scores = parse_classifier_scores(&json, 2, "offensive").unwrap();
        assert_eq!(scores, vec![0.1, 0.8]);
    }

    #[test]
    fn test_parse_classifier_single_flat() {
        let json = serde_json::json!([{"label": "LABEL_0", "score": 0.3}, {"label": "LABEL_1", "score": 0.7}]);
        assert_eq!(parse_classifier_scores(&json, 1, "offensive").unwrap(), vec![0.7]);
    }

    #[test]
    fn test_parse_classifier_row_mismatch() {
        let json = serde_json::json!([[{"label": "offensive", "score": 0.8}]]);
        assert!(parse_classifier_scores(&json, 2, "offensive").is_err());
    }

    #[test]
    fn test_parse_classifier_error_body() {
        let json = serde_json::json!({"error": "Model is currently loading"});
        assert!(parse_classifier_scores(&json, 1, "offensive").is_err());
    }

    #[test]
    fn test_extract_perspective_score() {
        let json = serde_json::json!({
            "attributeScores": {
                "TOXICITY": {
                    "spanScores": [],
                    "summaryScore": {"value": 0.42, "type": "PROBABILITY"}
                }
            },
            "languages": ["en"]
        });
        assert_eq!(extract_perspective_score(&json).unwrap(), 0.42);
        assert!(extract_perspective_score(&serde_json::json!({})).is_err());
    }

    use crate::testutil::serve_stub;
    use axum::{Json, Router, extract::Query, http::HeaderMap, http::StatusCode, response::IntoResponse, routing::post};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    fn later(secs: u64) -> Instant {
        Instant::now() + Duration::from_secs(secs)
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| if i % 10 == 3 { format!("idiot {i}") } else { format!("comment {i}") }).collect()
    }

    /// Inference stub labelling texts containing "idiot" as offensive; records
    /// each batch size and Authorization header
    fn inference_stub(seen: Arc<Mutex<Vec<(usize, Option<String>)>>>, delay: Duration) -> Router {
        Router::new().route(
            "/models/test-model",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let seen = seen.clone();
                async move {
                    tokio::time::sleep(delay).await;
                    let inputs = body["inputs"].as_array().cloned().unwrap_or_default();
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    seen.lock().unwrap().push((inputs.len(), auth));
                    let rows: Vec<serde_json::Value> = inputs
                        .iter()
                        .map(|t| {
                            let score = if t.as_str().unwrap_or("").contains("idiot") { 0.9 } else { 0.1 };
                            serde_json::json!([
                                {"label": "offensive", "score": score},
                                {"label": "non-offensive", "score": 1.0 - score}
                            ])
                        })
                        .collect();
                    Json(serde_json::Value::Array(rows))
                }
            }),
        )
    }

    fn classifier(base: &str, token: Option<&str>) -> ClassifierAnalyzer {
        let cfg = ToxicityConfig {
            endpoint: format!("{base}/models/"),
            model: "test-model".to_string(),
            ..ToxicityConfig::default()
        };
        ClassifierAnalyzer::new(reqwest::Client::new(), &cfg, token.map(str::to_string))
    }

    #[tokio::test]
    async fn test_classifier_batches_and_authenticates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = serve_stub(inference_stub(seen.clone(), Duration::ZERO)).await;

        let mut input = texts(70);
        input.push(String::new());
        let outcome = classifier(&base, Some("hf_test")).analyze(&input, later(10)).await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.scores.len(), 70);
        assert_eq!(outcome.scores[3], ToxicityScore { text: "idiot 3".to_string(), score: 0.9 });
        assert_eq!(filter_toxic(outcome.scores, 0.5).len(), 7);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.iter().map(|(n, _)| *n).collect::<Vec<_>>(), vec![32, 32, 6]);
        assert!(seen.iter().all(|(_, auth)| auth.as_deref() == Some("Bearer hf_test")));
    }

    #[tokio::test]
    async fn test_classifier_without_token_sends_no_auth() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = serve_stub(inference_stub(seen.clone(), Duration::ZERO)).await;
        classifier(&base, None).analyze(&texts(2), later(10)).await;
        assert_eq!(seen.lock().unwrap()[0].1, None);
    }

    #[tokio::test]
    async fn test_classifier_error_status() {
        let router = Router::new().route(
            "/models/test-model",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "Model is currently loading") }),
        );
        let base = serve_stub(router).await;
        let outcome = classifier(&base, None).analyze(&texts(5), later(10)).await;
        assert!(outcome.scores.is_empty());
        assert!(outcome.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_classifier_deadline_keeps_scored_batches() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = serve_stub(inference_stub(seen, Duration::from_millis(300))).await;

        let deadline = Instant::now() + Duration::from_secs(1);
        let outcome = classifier(&base, None).analyze(&texts(200), deadline).await;

        assert!(!outcome.scores.is_empty());
        assert!(outcome.scores.len() < 200);
        assert_eq!(outcome.scores.len() % CLASSIFIER_BATCH, 0);
        assert!(outcome.error.unwrap().starts_with("timed out after scoring"));
        assert!(Instant::now() < deadline + Duration::from_millis(250));
    }

    /// Moderation stub: 500 for texts containing "fail", otherwise 0.8 for
    /// "idiot" and 0.2 for anything else. Records the `key` query parameter.
    fn perspective_stub(keys: Arc<Mutex<Vec<String>>>) -> Router {
        Router::new().route(
            "/analyze",
            post(
                move |Query(query): Query<HashMap<String, String>>, Json(body): Json<serde_json::Value>| {
                    let keys = keys.clone();
                    async move {
                        keys.lock().unwrap().extend(query.get("key").cloned());
                        let text = body["comment"]["text"].as_str().unwrap_or("").to_string();
                        if text.contains("fail") {
                            return (StatusCode::INTERNAL_SERVER_ERROR, "backend error").into_response();
                        }
                        let value = if text.contains("idiot") { 0.8 } else { 0.2 };
                        Json(serde_json::json!({
                            "attributeScores": {"TOXICITY": {"summaryScore": {"value": value, "type": "PROBABILITY"}}}
                        }))
                        .into_response()
                    }
                },
            ),
        )
    }

    #[tokio::test]
    async fn test_perspective_skips_failed_comments() {
        let keys = Arc::new(Mutex::new(Vec::new()));
        let base = serve_stub(perspective_stub(keys.clone())).await;
        let analyzer = PerspectiveAnalyzer::new(reqwest::Client::new(), "pk_test")
            .with_url(format!("{base}/analyze"));

        let input = vec!["you idiot".to_string(), "fail me".to_string(), String::new(), "nice".to_string()];
        let outcome = analyzer.analyze(&input, later(10)).await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.scores, vec![score("you idiot", 0.8), score("nice", 0.2)]);
        assert_eq!(*keys.lock().unwrap(), vec!["pk_test".to_string(); 3]);
    }

    #[tokio::test]
    async fn test_perspective_all_failed_is_error() {
        let base = serve_stub(perspective_stub(Arc::new(Mutex::new(Vec::new())))).await;
        let analyzer = PerspectiveAnalyzer::new(reqwest::Client::new(), "pk_test")
            .with_url(format!("{base}/analyze"));

        let outcome = analyzer.analyze(&["fail a".to_string(), "fail b".to_string()], later(10)).await;
        assert!(outcome.scores.is_empty());
        let err = outcome.error.unwrap();
        assert!(err.contains("every Perspective request failed"));
        assert!(err.contains("500"));
    }

    #[test]
    fn test_from_config_classifier() {
        let analyzer = from_config(&ToxicityConfig::default(), reqwest::Client::new()).unwrap();
        assert_eq!(analyzer.name(), "classifier");
    }
}
