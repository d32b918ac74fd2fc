use std::time::Duration;

use hermes_core::client::ScrapeClient;
use hermes_core::config::Config;
use hermes_core::error::AppError;
use hermes_core::traits::{ApiRequest, ApiResponse, HttpMethod, ScrapeTransport};
use reqwest::Client;
use url::Url;

/// Bright Data datasets API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.brightdata.com/datasets/v3";

const USER_AGENT: &str = "Hermes/0.2 (social scraper)";

// Connection establishment only. The session deadline owns total request
// time, so no overall reqwest timeout is set here.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed transport for the scrape API.
///
/// Owns the base URL and the bearer token. Returns the status and body of
/// every HTTP response; only wire-level failures become errors.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl ReqwestTransport {
    pub fn new(api_key: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, AppError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| AppError::ConfigError(format!("invalid base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::ConfigError(format!(
                "base URL cannot carry paths: {base_url}"
            )));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AppError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    /// Joins the request path and query onto the base URL.
    ///
    /// Each path segment is percent-encoded as a whole, so snapshot ids
    /// with reserved characters cannot break out of their segment.
    fn build_url(&self, request: &ApiRequest) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AppError::ConfigError(format!("base URL cannot carry paths: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(&request.path);

        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

impl ScrapeTransport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, AppError> {
        let url = self.build_url(request)?;
        tracing::debug!(method = ?request.method, %url, "Executing API request");

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };
        builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::NetworkError(format!("request timed out: {e}"))
            } else if e.is_connect() {
                AppError::NetworkError(format!("connection failed: {e}"))
            } else {
                AppError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::NetworkError(format!("failed to read response body: {e}")))?;

        Ok(ApiResponse::new(status, body))
    }
}

/// Builds a ready-to-use scrape client against the production API.
pub fn build_client(config: &Config) -> Result<ScrapeClient<ReqwestTransport>, AppError> {
    let transport = ReqwestTransport::new(&config.api_key)?;
    Ok(ScrapeClient::new(transport, config))
}

/// Builds a scrape client against a custom API endpoint.
pub fn build_client_with_base_url(
    config: &Config,
    base_url: &str,
) -> Result<ScrapeClient<ReqwestTransport>, AppError> {
    let transport = ReqwestTransport::with_base_url(&config.api_key, base_url)?;
    Ok(ScrapeClient::new(transport, config))
}
