use std::future::Future;

use crate::error::AppError;

/// HTTP methods the scrape API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One request to the scrape API, relative to the transport's base URL.
///
/// Path segments are kept unencoded here; the transport percent-encodes
/// them when it builds the final URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl IntoIterator<Item = impl Into<String>>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Raw response from the scrape API: status plus the unparsed body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes raw HTTP exchanges with the scrape API.
///
/// Implementations return `Ok` for every HTTP status; `Err` is reserved for
/// wire-level failures (DNS, connect, TLS, truncated bodies). Status
/// classification belongs to the client, which keeps mocks trivial.
pub trait ScrapeTransport: Send + Sync + Clone {
    fn execute(
        &self,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, AppError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let get = ApiRequest::get(["progress", "snap_1"]).with_query("format", "json");
        assert_eq!(get.method, HttpMethod::Get);
        assert_eq!(get.path, vec!["progress".to_string(), "snap_1".to_string()]);
        assert_eq!(get.query, vec![("format".to_string(), "json".to_string())]);
        assert!(get.body.is_none());

        let post = ApiRequest::post(["scrape"], serde_json::json!([{"url": "u"}]));
        assert_eq!(post.method, HttpMethod::Post);
        assert!(post.body.is_some());
    }

    #[test]
    fn test_success_range() {
        assert!(ApiResponse::new(200, "").is_success());
        assert!(ApiResponse::new(202, "").is_success());
        assert!(ApiResponse::new(299, "").is_success());
        assert!(!ApiResponse::new(199, "").is_success());
        assert!(!ApiResponse::new(301, "").is_success());
        assert!(!ApiResponse::new(404, "").is_success());
    }
}
