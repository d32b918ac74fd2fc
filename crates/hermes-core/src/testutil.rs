//! Test utilities: mock transport and config helpers.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! The mock transport uses `Arc<Mutex<_>>` for interior mutability,
//! allowing test assertions on recorded calls and their timing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::Config;
use crate::error::AppError;
use crate::traits::{ApiRequest, ApiResponse, ScrapeTransport};

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// Mock transport that replays a scripted queue of responses.
#[derive(Clone)]
pub struct MockTransport {
    /// Queue of responses. Each call pops the first element. An exhausted
    /// queue yields a network error so over-polling shows up in tests.
    responses: Arc<Mutex<Vec<Result<ApiResponse, AppError>>>>,
    /// Requests recorded in execution order.
    pub requests: Arc<Mutex<Vec<ApiRequest>>>,
    /// Instant each request arrived, for asserting poll spacing under a
    /// paused runtime clock.
    pub request_times: Arc<Mutex<Vec<tokio::time::Instant>>>,
    /// Simulated network latency applied before answering.
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new(response: ApiResponse) -> Self {
        Self::with_responses(vec![Ok(response)])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<ApiResponse, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
            request_times: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Adds fixed latency to every response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Gaps between consecutive requests, in milliseconds.
    pub fn request_gaps_ms(&self) -> Vec<u128> {
        let times = self.request_times.lock().unwrap();
        times
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect()
    }
}

impl ScrapeTransport for MockTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        self.request_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Err(AppError::NetworkError(
                "mock transport exhausted: no scripted response left".to_string(),
            ))
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Config with a fixed key and the default timeout.
pub fn make_test_config() -> Config {
    Config::new("test-api-key")
}

/// 202 acceptance response for a snapshot id.
pub fn accepted_response(snapshot_id: &str) -> ApiResponse {
    ApiResponse::new(202, format!(r#"{{"snapshot_id": "{snapshot_id}"}}"#))
}

/// 200 progress response with the given status.
pub fn progress_response(status: &str) -> ApiResponse {
    ApiResponse::new(200, format!(r#"{{"status": "{status}"}}"#))
}

/// 200 progress response for a failed job with an error message.
pub fn failed_response(error: &str) -> ApiResponse {
    ApiResponse::new(200, format!(r#"{{"status": "failed", "error": "{error}"}}"#))
}
