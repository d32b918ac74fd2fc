use serde::Serialize;
use serde_json::{Map, Value};

use crate::client::ScrapeClient;
use crate::datasets::Platform;
use crate::error::AppError;
use crate::job::ScrapeRequest;
use crate::traits::ScrapeTransport;

/// Platforms accepted by the post scan tool.
pub const SCAN_PLATFORMS: &[Platform] = &[
    Platform::Instagram,
    Platform::Facebook,
    Platform::TikTok,
    Platform::LinkedIn,
];

/// Platforms accepted by the profile lookup tool.
pub const PROFILE_PLATFORMS: &[Platform] = &[
    Platform::Instagram,
    Platform::Facebook,
    Platform::TikTok,
    Platform::Reddit,
];

/// Comments returned per Reddit post when the caller does not say.
pub const DEFAULT_MAX_COMMENTS: usize = 20;

/// First result row of a platform scrape, with its request context.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformScrape {
    pub platform: Platform,
    pub url: String,
    pub result: Value,
}

/// Parameters for the post scan tool.
#[derive(Debug, Clone, Default)]
pub struct ScanParams {
    pub url: String,
    pub platform: Option<Platform>,
    pub num_of_posts: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub post_type: Option<String>,
}

impl ScanParams {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Parameters for the Reddit scan tool.
#[derive(Debug, Clone)]
pub struct RedditScanParams {
    pub url: String,
    pub include_comments: bool,
    pub max_comments: usize,
}

impl RedditScanParams {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            include_comments: true,
            max_comments: DEFAULT_MAX_COMMENTS,
        }
    }
}

/// A scraped Reddit post plus its top comments.
#[derive(Debug, Clone, Serialize)]
pub struct RedditScan {
    pub url: String,
    pub post: Value,
    /// `None` when comments were skipped or could not be fetched; the
    /// post itself is still returned in that case.
    pub comments: Option<Vec<Value>>,
}

/// Scans a post URL, or discovers recent posts from a profile URL.
pub async fn scan_post<T: ScrapeTransport>(
    client: &ScrapeClient<T>,
    params: &ScanParams,
) -> Result<Option<PlatformScrape>, AppError> {
    let mut filters = Map::new();
    if let Some(n) = params.num_of_posts {
        filters.insert("num_of_posts".to_string(), Value::from(n));
    }
    if let Some(start) = &params.start_date {
        filters.insert("start_date".to_string(), Value::from(start.as_str()));
    }
    if let Some(end) = &params.end_date {
        filters.insert("end_date".to_string(), Value::from(end.as_str()));
    }
    if let Some(kind) = &params.post_type {
        filters.insert("post_type".to_string(), Value::from(kind.as_str()));
    }

    execute_platform_scrape(
        client,
        &params.url,
        params.platform,
        SCAN_PLATFORMS,
        "posts",
        filters,
    )
    .await
}

/// Looks up a public profile by URL.
pub async fn lookup_profile<T: ScrapeTransport>(
    client: &ScrapeClient<T>,
    url: &str,
    platform: Option<Platform>,
) -> Result<Option<PlatformScrape>, AppError> {
    execute_platform_scrape(client, url, platform, PROFILE_PLATFORMS, "profiles", Map::new()).await
}

/// Scans a Reddit post and, best effort, its top comments.
///
/// A failed comment fetch degrades to `comments: None` with a warning
/// instead of discarding the already-scraped post.
pub async fn scan_reddit<T: ScrapeTransport>(
    client: &ScrapeClient<T>,
    params: &RedditScanParams,
) -> Result<Option<RedditScan>, AppError> {
    let url = params.url.trim();
    if url.is_empty() {
        return Err(AppError::InvalidInput("url is required".to_string()));
    }
    if Platform::detect(url) != Some(Platform::Reddit) {
        return Err(AppError::InvalidInput(
            "URL does not appear to be a Reddit link".to_string(),
        ));
    }

    let post_request =
        ScrapeRequest::new("reddit_posts").with_row(Value::Object(url_row(url)));
    let mut posts = client.submit_and_await(&post_request).await?;
    if posts.is_empty() {
        return Ok(None);
    }
    let post = posts.swap_remove(0);

    let comments = if params.include_comments {
        let comment_request =
            ScrapeRequest::new("reddit_comments").with_row(Value::Object(url_row(url)));
        match client.submit_and_await(&comment_request).await {
            Ok(mut comments) => {
                comments.truncate(params.max_comments);
                Some(comments)
            }
            Err(error) => {
                tracing::warn!(%url, %error, "Could not fetch Reddit comments");
                None
            }
        }
    } else {
        None
    };

    Ok(Some(RedditScan {
        url: url.to_string(),
        post,
        comments,
    }))
}

/// Shared flow for the platform tools: validate the URL, settle the
/// platform, build the input row, scrape, and peel off the first result.
pub async fn execute_platform_scrape<T: ScrapeTransport>(
    client: &ScrapeClient<T>,
    url: &str,
    platform: Option<Platform>,
    allowed: &[Platform],
    dataset_suffix: &str,
    filters: Map<String, Value>,
) -> Result<Option<PlatformScrape>, AppError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(AppError::InvalidInput("url is required".to_string()));
    }

    // An explicit platform parameter wins over URL detection, and both
    // funnel through the same allow-list check.
    let platform = match platform.or_else(|| Platform::detect(url)) {
        Some(p) if allowed.contains(&p) => p,
        _ => {
            return Err(AppError::InvalidInput(format!(
                "Could not detect platform from URL. Provide a platform parameter ({}).",
                join_platforms(allowed)
            )));
        }
    };

    let mut row = url_row(url);
    for (key, value) in filters {
        if !value.is_null() {
            row.insert(key, value);
        }
    }

    let dataset_key = format!("{}_{}", platform.as_str(), dataset_suffix);
    let request = ScrapeRequest::new(dataset_key).with_row(Value::Object(row));
    let mut rows = client.submit_and_await(&request).await?;

    if rows.is_empty() {
        return Ok(None);
    }
    Ok(Some(PlatformScrape {
        platform,
        url: url.to_string(),
        result: rows.swap_remove(0),
    }))
}

fn url_row(url: &str) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert("url".to_string(), Value::from(url));
    row
}

fn join_platforms(platforms: &[Platform]) -> String {
    platforms
        .iter()
        .map(Platform::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
