use async_trait::async_trait;
use eyre::{Result, bail};
use log::debug;
use serde::Serialize;

const SYSTEM_PROMPT: &str = "You are an AI assistant analyzing YouTube comments for the channel owner. \
Be concise and concrete, and base every point on what commenters actually wrote.";

/// Upper bound on comment text sent to the model, in characters
const MAX_PROMPT_CHARS: usize = 60_000;

/// The generated report kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Summary,
    Demands,
    Suggestions,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] = [ReportKind::Summary, ReportKind::Demands, ReportKind::Suggestions];

    fn instruction(&self) -> &'static str {
        match self {
            ReportKind::Summary => "Provide a concise **pointwise summary** of these comments in 10 lines.",
            ReportKind::Demands => {
                "Identify **public demands** based on recurring themes and requests. \
                 Provide **1 to 5 key demands** in a numbered list."
            }
            ReportKind::Suggestions => {
                "Generate **5 to 10 constructive suggestions** for the YouTuber to improve their content."
            }
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportKind::Summary => write!(f, "summary"),
            ReportKind::Demands => write!(f, "public_demands"),
            ReportKind::Suggestions => write!(f, "suggestions"),
        }
    }
}

/// Generated reports; a kind that failed carries its error message instead
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AiReport {
    pub summary: Option<String>,
    pub public_demands: Option<String>,
    pub suggestions: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl AiReport {
    pub fn set(&mut self, kind: ReportKind, result: Result<String>) {
        let text = match result {
            Ok(text) => text,
            Err(e) => {
                self.errors.push(format!("{kind}: {e:#}"));
                return;
            }
        };
        match kind {
            ReportKind::Summary => self.summary = Some(text),
            ReportKind::Demands => self.public_demands = Some(text),
            ReportKind::Suggestions => self.suggestions = Some(text),
        }
    }
}

/// Produces free-text reports from a set of comments
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, kind: ReportKind, comments: &[String]) -> Result<String>;
}

/// Build the user prompt for one report kind
pub fn build_prompt(kind: ReportKind, comments: &[String]) -> String {
    let mut listing = String::new();
    for comment in comments.iter().filter(|c| !c.is_empty()) {
        if listing.len() + comment.len() + 3 > MAX_PROMPT_CHARS {
            break;
        }
        listing.push_str("- ");
        listing.push_str(comment);
        listing.push('\n');
    }
    format!("Analyze the following YouTube comments:\n\n{listing}\n{}", kind.instruction())
}

/// LLM-backed generator; the provider follows from the model name
pub struct LlmReporter {
    client: reqwest::Client,
    model: String,
}

impl LlmReporter {
    pub fn new(client: reqwest::Client, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ReportGenerator for LlmReporter {
    async fn generate(&self, kind: ReportKind, comments: &[String]) -> Result<String> {
        let prompt = build_prompt(kind, comments);
        debug!("Generating {kind} report with {} ({} chars)", self.model, prompt.len());

        let text = match provider(&self.model) {
            Provider::Gemini => generate_gemini(&self.client, &prompt, &self.model).await?,
            Provider::Anthropic => generate_anthropic(&self.client, &prompt, &self.model).await?,
            Provider::OpenAi => generate_openai(&self.client, &prompt, &self.model).await?,
        };
        Ok(text.trim().to_string())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Provider {
    Gemini,
    Anthropic,
    OpenAi,
}

fn provider(model: &str) -> Provider {
    if model.starts_with("gemini") {
        Provider::Gemini
    } else if model.starts_with("claude") {
        Provider::Anthropic
    } else {
        Provider::OpenAi
    }
}

/// Send a prepared request and return the JSON body, failing on non-2xx
async fn send_json(req: reqwest::RequestBuilder, provider: &str) -> Result<serde_json::Value> {
    let resp = req.send().await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("{provider} API returned {status}: {body}");
    }

    Ok(resp.json().await?)
}

fn env_key(var: &str, provider: &str) -> Result<String> {
    std::env::var(var)
        .map_err(|_| eyre::eyre!("{var} environment variable not set (required for {provider} reports)"))
}

async fn generate_gemini(client: &reqwest::Client, prompt: &str, model: &str) -> Result<String> {
    let api_key = env_key("GEMINI_API_KEY", "Gemini")?;
    let url = format!("https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent");

    let body = serde_json::json!({
        "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
    });

    let req = client.post(&url).header("x-goog-api-key", &api_key).json(&body);
    extract_gemini_text(&send_json(req, "Gemini").await?)
}

fn extract_gemini_text(json: &serde_json::Value) -> Result<String> {
    if let Some(parts) = json.pointer("/candidates/0/content/parts").and_then(|p| p.as_array()) {
        let text: String = parts.iter().filter_map(|part| part.get("text")?.as_str()).collect();
        if !text.is_empty() {
            return Ok(text);
        }
    }
    bail!("unexpected Gemini API response format");
}

async fn generate_anthropic(client: &reqwest::Client, prompt: &str, model: &str) -> Result<String> {
    let api_key = env_key("ANTHROPIC_API_KEY", "Claude")?;

    let body = serde_json::json!({
        "model": model,
        "max_tokens": 2048,
        "system": SYSTEM_PROMPT,
        "messages": [{ "role": "user", "content": prompt }]
    });

    let req = client
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", &api_key)
        .header("anthropic-version", "2023-06-01")
        .json(&body);
    extract_anthropic_text(&send_json(req, "Anthropic").await?)
}

fn extract_anthropic_text(json: &serde_json::Value) -> Result<String> {
    let text: String = json
        .get("content")
        .and_then(|c| c.as_array())
        .into_iter()
        .flatten()
        .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|block| block.get("text")?.as_str())
        .collect();
    if text.is_empty() {
        bail!("unexpected Anthropic API response format");
    }
    Ok(text)
}

async fn generate_openai(client: &reqwest::Client, prompt: &str, model: &str) -> Result<String> {
    let api_key = env_key("OPENAI_API_KEY", "OpenAI")?;

    let body = serde_json::json!({
        "model": model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": prompt }
        ]
    });

    let req = client.post("https://api.openai.com/v1/chat/completions").bearer_auth(&api_key).json(&body);
    extract_openai_text(&send_json(req, "OpenAI").await?)
}

fn extract_openai_text(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| eyre::eyre!("unexpected OpenAI API response format"))
}
