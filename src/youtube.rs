use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::Comment;

const COMMENT_THREADS_URL: &str = "https://www.googleapis.com/youtube/v3/commentThreads";

/// Largest `maxResults` the commentThreads endpoint accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Failure of a single page request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("comments are disabled for video {0}")]
    CommentsDisabled(String),

    #[error("video {0} not found")]
    VideoNotFound(String),

    #[error("YouTube API rejected credentials: {0}")]
    Auth(String),

    #[error("YouTube API returned {status} ({reason}): {message}")]
    Status {
        status: u16,
        reason: String,
        message: String,
    },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("YOUTUBE_API_KEY environment variable not set")]
    MissingApiKey,
}

impl FetchError {
    /// Whether retrying the same request could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) => true,
            FetchError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            FetchError::Status { status, reason, .. } => {
                *status == 429
                    || *status >= 500
                    || matches!(
                        reason.as_str(),
                        "rateLimitExceeded" | "userRateLimitExceeded" | "backendError"
                    )
            }
            FetchError::CommentsDisabled(_)
            | FetchError::VideoNotFound(_)
            | FetchError::Auth(_)
            | FetchError::MissingApiKey => false,
        }
    }

    /// Permanent failure caused by the requested video rather than by us
    pub fn is_video_error(&self) -> bool {
        matches!(self, FetchError::CommentsDisabled(_) | FetchError::VideoNotFound(_))
    }
}

/// One page of comments as returned by the listing API
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub next_page_token: Option<String>,
}

/// A paginated comment listing service
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Request one page. `Ok(None)` means the response carried no `items`
    /// field and should be treated as end-of-stream.
    async fn list_page(
        &self,
        video_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<Option<CommentPage>, FetchError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadListResponse {
    items: Option<Vec<serde_json::Value>>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentThread {
    snippet: ThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadSnippet {
    top_level_comment: TopLevelComment,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    text_display: String,
    #[serde(default)]
    like_count: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: String,
}

/// YouTube Data API v3 commentThreads client
pub struct YouTubeClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: COMMENT_THREADS_URL.to_string(),
        }
    }

    /// Build a client from `YOUTUBE_API_KEY`
    pub fn from_env(client: reqwest::Client) -> Result<Self, FetchError> {
        let api_key = std::env::var("YOUTUBE_API_KEY").map_err(|_| FetchError::MissingApiKey)?;
        Ok(Self::new(client, api_key))
    }

    /// Point the client at a different commentThreads endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl CommentSource for YouTubeClient {
    async fn list_page(
        &self,
        video_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<Option<CommentPage>, FetchError> {
        let max_results = max_results.clamp(1, MAX_PAGE_SIZE).to_string();
        let mut query = vec![
            ("part", "snippet"),
            ("videoId", video_id),
            ("maxResults", max_results.as_str()),
            ("textFormat", "plainText"),
            ("key", self.api_key.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        debug!("Requesting comment page: video={video_id} max={max_results} token={page_token:?}");

        let resp = self.client.get(&self.base_url).query(&query).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body, video_id));
        }

        Ok(parse_page(&body))
    }
}

/// Map an error response to a `FetchError`
fn classify_error(status: u16, body: &str, video_id: &str) -> FetchError {
    let (reason, message) = match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(env) => (
            env.error.errors.into_iter().next().map(|d| d.reason).unwrap_or_default(),
            env.error.message,
        ),
        Err(_) => (String::new(), body.chars().take(200).collect()),
    };

    if reason == "commentsDisabled" {
        return FetchError::CommentsDisabled(video_id.to_string());
    }
    if reason == "videoNotFound" || status == 404 {
        return FetchError::VideoNotFound(video_id.to_string());
    }
    if status == 401 || reason == "keyInvalid" || reason == "forbidden" {
        return FetchError::Auth(message);
    }
    FetchError::Status {
        status,
        reason,
        message,
    }
}

/// Parse a successful response body; `None` when `items` is absent or the
/// body is not the expected JSON object
fn parse_page(body: &str) -> Option<CommentPage> {
    let resp: ThreadListResponse = match serde_json::from_str(body) {
        Ok(resp) => resp,
        Err(e) => {
            warn!("Malformed commentThreads response, treating as end of stream: {e}");
            return None;
        }
    };

    let items = resp.items?;
    let mut comments = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<CommentThread>(item) {
            Ok(thread) => {
                let snippet = thread.snippet.top_level_comment.snippet;
                comments.push(Comment::new(snippet.text_display, snippet.like_count));
            }
            Err(e) => warn!("Skipping malformed comment item: {e}"),
        }
    }

    Some(CommentPage {
        comments,
        next_page_token: resp.next_page_token.filter(|t| !t.is_empty()),
    })
}
