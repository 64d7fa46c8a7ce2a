use std::time::Duration;

use log::{debug, info};

use crate::Comment;
use crate::retry::RetryPolicy;
use crate::youtube::{CommentSource, FetchError, MAX_PAGE_SIZE};

/// Pagination settings for one fetch
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub retry: RetryPolicy,
    /// Upper bound on a single page request; an expired attempt counts as a
    /// transient failure
    pub request_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Fetch up to `limit` top-level comments for `video_id`, in API order.
///
/// Stops when `limit` comments were requested, when the API stops returning
/// a next-page token, or when a page comes back without `items`. Errors are
/// returned once the retry policy gives up; a partial list is never returned
/// in place of an error.
pub async fn fetch_comments<S>(
    source: &S,
    video_id: &str,
    limit: i64,
    opts: &FetchOptions,
) -> Result<Vec<Comment>, FetchError>
where
    S: CommentSource + ?Sized,
{
    let mut accumulated = Vec::new();
    if limit <= 0 {
        return Ok(accumulated);
    }

    let mut remaining = limit;
    let mut page_token: Option<String> = None;

    while remaining > 0 {
        let batch_size = remaining.min(MAX_PAGE_SIZE as i64) as u32;
        let token = page_token.as_deref();

        let page = opts
            .retry
            .run(|| async move {
                match tokio::time::timeout(opts.request_timeout, source.list_page(video_id, batch_size, token)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout(opts.request_timeout)),
                }
            })
            .await?;

        let Some(page) = page else {
            debug!("Page without items for {video_id}, stopping");
            break;
        };

        accumulated.extend(page.comments);
        remaining -= i64::from(batch_size);
        page_token = page.next_page_token;

        if page_token.is_none() {
            break;
        }
    }

    accumulated.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    info!("Fetched {} comments for {video_id}", accumulated.len());
    Ok(accumulated)
}
