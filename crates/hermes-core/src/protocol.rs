//! Wire contract of the Bright Data datasets API.
//!
//! Pure functions from raw [`ApiResponse`]s to typed outcomes. Response
//! bodies are navigated dynamically and only the documented fields are
//! read, so extra fields the provider adds never break parsing.

use serde_json::Value;

use crate::error::AppError;
use crate::job::JobStatus;
use crate::traits::{ApiRequest, ApiResponse};

/// Message used when a failed job carries no error text.
pub const DEFAULT_FAILURE_MESSAGE: &str = "(no error reported by provider)";

/// Outcome of a scrape submission.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// HTTP 200: the provider answered synchronously with the full result.
    Complete(Vec<Value>),
    /// HTTP 202: the provider accepted an asynchronous job.
    Accepted { snapshot_id: String },
}

/// One progress report for an asynchronous job.
#[derive(Debug, Clone)]
pub struct ProgressReport {
    pub status: JobStatus,
    pub error: Option<String>,
}

/// Builds the submission request for a resolved dataset id.
pub fn submit_request(dataset_id: &str, rows: &[Value]) -> ApiRequest {
    ApiRequest::post(["scrape"], Value::Array(rows.to_vec()))
        .with_query("dataset_id", dataset_id)
        .with_query("format", "json")
}

/// Builds the progress request for a snapshot id.
pub fn progress_request(snapshot_id: &str) -> ApiRequest {
    ApiRequest::get(["progress", snapshot_id])
}

/// Builds the snapshot content request for a snapshot id.
pub fn snapshot_request(snapshot_id: &str) -> ApiRequest {
    ApiRequest::get(["snapshot", snapshot_id]).with_query("format", "json")
}

/// Classifies a submission response.
///
/// Exactly 200 means synchronous completion and exactly 202 means an
/// accepted job; every other status, including other 2xx codes, goes
/// through the error taxonomy.
pub fn parse_submit_response(response: &ApiResponse) -> Result<SubmitOutcome, AppError> {
    match response.status {
        200 => parse_rows(&response.body).map(SubmitOutcome::Complete),
        202 => extract_snapshot_id(&response.body)
            .map(|snapshot_id| SubmitOutcome::Accepted { snapshot_id }),
        _ => Err(AppError::from_status(response.status, &response.body)),
    }
}

/// Parses a progress response.
///
/// A missing or non-string `status` field keeps the job in the unknown
/// bucket, which the client treats as still running.
pub fn parse_progress_response(response: &ApiResponse) -> Result<ProgressReport, AppError> {
    if !response.is_success() {
        return Err(AppError::from_status(response.status, &response.body));
    }
    let parsed: Value = serde_json::from_str(&response.body)
        .map_err(|e| AppError::ProtocolViolation(format!("progress body is not JSON: {e}")))?;

    let status = parsed
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let error = parsed
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ProgressReport {
        status: JobStatus::from(status),
        error,
    })
}

/// Parses a snapshot content response into result rows.
pub fn parse_snapshot_response(response: &ApiResponse) -> Result<Vec<Value>, AppError> {
    if !response.is_success() {
        return Err(AppError::from_status(response.status, &response.body));
    }
    parse_rows(&response.body)
}

fn parse_rows(body: &str) -> Result<Vec<Value>, AppError> {
    serde_json::from_str::<Vec<Value>>(body)
        .map_err(|e| AppError::ProtocolViolation(format!("expected a JSON array of rows: {e}")))
}

fn extract_snapshot_id(body: &str) -> Result<String, AppError> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| AppError::ProtocolViolation(format!("202 body is not JSON: {e}")))?;
    match parsed.get("snapshot_id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(AppError::ProtocolViolation(
            "202 accepted without a usable snapshot_id".to_string(),
        )),
    }
}
