use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::config::Config;
use crate::datasets::resolve_dataset_id;
use crate::deadline::Deadline;
use crate::error::AppError;
use crate::job::{JobStatus, ScrapeRequest, SnapshotJob};
use crate::protocol::{self, DEFAULT_FAILURE_MESSAGE, SubmitOutcome};
use crate::traits::{ApiRequest, ApiResponse, ScrapeTransport};

/// Drives a scrape from submission to final rows.
///
/// Submissions either complete synchronously (HTTP 200) or come back as an
/// accepted job (HTTP 202) that is polled until ready, with the poll delay
/// growing after each still-running report. One deadline spans the whole
/// session and every suspension point observes it, so neither a hung
/// network call nor a backoff sleep can outlive it.
///
/// Generic over the transport via [`ScrapeTransport`], enabling tests
/// without real HTTP.
pub struct ScrapeClient<T: ScrapeTransport> {
    transport: T,
    timeout: Duration,
    dataset_overrides: HashMap<String, String>,
    backoff: Backoff,
}

impl<T: ScrapeTransport> ScrapeClient<T> {
    pub fn new(transport: T, config: &Config) -> Self {
        Self {
            transport,
            timeout: config.timeout,
            dataset_overrides: config.dataset_overrides.clone(),
            backoff: Backoff::default(),
        }
    }

    /// Overrides the poll schedule, mainly for tests and embedding.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Runs a scrape session bounded by the configured timeout.
    ///
    /// 1. Submit the input rows for the resolved dataset id
    /// 2. Return immediately on synchronous completion (200)
    /// 3. Otherwise poll the accepted job until ready (202)
    /// 4. Fetch the snapshot content exactly once
    pub async fn submit_and_await(&self, request: &ScrapeRequest) -> Result<Vec<Value>, AppError> {
        let deadline = Deadline::after(self.timeout);
        self.submit_and_await_until(request, deadline, &CancellationToken::new())
            .await
    }

    /// Runs a scrape session bounded by an explicit deadline.
    ///
    /// Cancelling `cancel` aborts the session as if the deadline had fired;
    /// both surface as [`AppError::Timeout`]. No further requests are
    /// issued after either signal.
    pub async fn submit_and_await_until(
        &self,
        request: &ScrapeRequest,
        deadline: Deadline,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, AppError> {
        let started = Instant::now();
        let dataset_id = resolve_dataset_id(&self.dataset_overrides, &request.dataset_key);
        tracing::debug!(
            dataset_key = %request.dataset_key,
            %dataset_id,
            rows = request.rows.len(),
            "Submitting scrape"
        );

        let submit = protocol::submit_request(dataset_id, &request.rows);
        let response = self.execute_bounded(&submit, deadline, cancel, started).await?;

        match protocol::parse_submit_response(&response)? {
            SubmitOutcome::Complete(rows) => {
                tracing::debug!(rows = rows.len(), "Scrape completed synchronously");
                Ok(rows)
            }
            SubmitOutcome::Accepted { snapshot_id } => {
                let job = SnapshotJob::new(snapshot_id);
                tracing::info!(snapshot_id = %job.snapshot_id, "Scrape accepted; polling until ready");
                self.poll_until_ready(&job, deadline, cancel, started).await
            }
        }
    }

    /// Polls an accepted job until it turns terminal or the deadline fires.
    ///
    /// Sleeps first, then polls. The delay grows only after a still-running
    /// report and never resets within a session.
    async fn poll_until_ready(
        &self,
        job: &SnapshotJob,
        deadline: Deadline,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<Vec<Value>, AppError> {
        let mut backoff = self.backoff.clone();
        let mut polls = 0u32;

        loop {
            self.wait_bounded(backoff.current(), deadline, cancel, started)
                .await?;
            polls += 1;

            let progress_req = protocol::progress_request(&job.snapshot_id);
            let response = self
                .execute_bounded(&progress_req, deadline, cancel, started)
                .await?;
            let progress = protocol::parse_progress_response(&response)?;

            match progress.status {
                JobStatus::Ready => {
                    tracing::info!(
                        snapshot_id = %job.snapshot_id,
                        polls,
                        age_ms = job.age_ms(),
                        "Snapshot ready; fetching content"
                    );
                    let snapshot_req = protocol::snapshot_request(&job.snapshot_id);
                    let response = self
                        .execute_bounded(&snapshot_req, deadline, cancel, started)
                        .await?;
                    return protocol::parse_snapshot_response(&response);
                }
                JobStatus::Failed => {
                    let message = progress
                        .error
                        .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                    tracing::warn!(snapshot_id = %job.snapshot_id, polls, %message, "Scrape job failed");
                    return Err(AppError::JobFailed(message));
                }
                status => {
                    tracing::debug!(
                        snapshot_id = %job.snapshot_id,
                        polls,
                        %status,
                        next_delay_ms = backoff.current().as_millis() as u64,
                        "Job still running"
                    );
                    backoff.grow();
                }
            }
        }
    }

    /// Executes one API request, racing it against the session bounds.
    ///
    /// The select is biased so that an already-fired cancel or deadline
    /// wins the race and no request is started after it.
    async fn execute_bounded(
        &self,
        request: &ApiRequest,
        deadline: Deadline,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<ApiResponse, AppError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AppError::Timeout(started.elapsed())),
            () = tokio::time::sleep_until(deadline.instant()) => Err(AppError::Timeout(started.elapsed())),
            response = self.transport.execute(request) => response,
        }
    }

    /// Sleeps for the backoff delay unless the session bounds fire first.
    async fn wait_bounded(
        &self,
        delay: Duration,
        deadline: Deadline,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<(), AppError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AppError::Timeout(started.elapsed())),
            () = tokio::time::sleep_until(deadline.instant()) => Err(AppError::Timeout(started.elapsed())),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use crate::traits::HttpMethod;
    use serde_json::json;

    fn make_client(transport: MockTransport) -> ScrapeClient<MockTransport> {
        ScrapeClient::new(transport, &make_test_config())
    }

    fn request(key: &str) -> ScrapeRequest {
        ScrapeRequest::new(key).with_row(json!({"url": "https://instagram.com/p/1"}))
    }

    #[tokio::test]
    async fn sync_completion_returns_rows_without_polling() {
        let transport = MockTransport::new(ApiResponse::new(200, r#"[{"title": "hello"}]"#));
        let client = make_client(transport.clone());

        let rows = client.submit_and_await(&request("instagram_posts")).await.unwrap();

        assert_eq!(rows, vec![json!({"title": "hello"})]);
        assert_eq!(transport.request_count(), 1);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].path, vec!["scrape".to_string()]);
        assert!(
            requests[0]
                .query
                .contains(&("dataset_id".to_string(), "gd_lk5ns7kz21pck8jpis".to_string()))
        );
        assert!(
            requests[0]
                .query
                .contains(&("format".to_string(), "json".to_string()))
        );
    }

    #[tokio::test]
    async fn dataset_override_wins_over_registry() {
        let transport = MockTransport::new(ApiResponse::new(200, "[]"));
        let config = make_test_config().with_dataset_override("instagram_posts", "gd_custom");
        let client = ScrapeClient::new(transport.clone(), &config);

        client.submit_and_await(&request("instagram_posts")).await.unwrap();

        let requests = transport.requests.lock().unwrap();
        assert!(
            requests[0]
                .query
                .contains(&("dataset_id".to_string(), "gd_custom".to_string()))
        );
    }

    #[tokio::test]
    async fn unknown_dataset_key_passes_through() {
        let transport = MockTransport::new(ApiResponse::new(200, "[]"));
        let client = make_client(transport.clone());

        client.submit_and_await(&request("gd_rawid123")).await.unwrap();

        let requests = transport.requests.lock().unwrap();
        assert!(
            requests[0]
                .query
                .contains(&("dataset_id".to_string(), "gd_rawid123".to_string()))
        );
    }

    #[tokio::test]
    async fn empty_result_rows_are_ok() {
        let transport = MockTransport::new(ApiResponse::new(200, "[]"));
        let client = make_client(transport);

        let rows = client.submit_and_await(&request("instagram_posts")).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_job_polls_until_ready() {
        let transport = MockTransport::with_responses(vec![
            Ok(accepted_response("snap_1")),
            Ok(progress_response("running")),
            Ok(progress_response("ready")),
            Ok(ApiResponse::new(200, r#"[{"title": "polled"}]"#)),
        ]);
        let client = make_client(transport.clone());

        let rows = client.submit_and_await(&request("instagram_posts")).await.unwrap();

        assert_eq!(rows, vec![json!({"title": "polled"})]);
        // submit, progress x2, snapshot fetch: the snapshot is fetched
        // exactly once.
        assert_eq!(transport.request_count(), 4);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[1].path, vec!["progress".to_string(), "snap_1".to_string()]);
        assert_eq!(requests[2].path, vec!["progress".to_string(), "snap_1".to_string()]);
        assert_eq!(requests[3].path, vec!["snapshot".to_string(), "snap_1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_delays_follow_the_backoff_schedule() {
        let mut responses = vec![Ok(accepted_response("snap_1"))];
        for _ in 0..6 {
            responses.push(Ok(progress_response("running")));
        }
        responses.push(Ok(progress_response("ready")));
        responses.push(Ok(ApiResponse::new(200, "[]")));

        let transport = MockTransport::with_responses(responses);
        let config = make_test_config().with_timeout(Duration::from_secs(300));
        let client = ScrapeClient::new(transport.clone(), &config);

        client.submit_and_await(&request("instagram_posts")).await.unwrap();

        // Gaps between consecutive requests: poll delays, then the
        // zero-delay snapshot fetch right after the ready report.
        assert_eq!(
            transport.request_gaps_ms(),
            vec![2_000, 3_000, 4_500, 6_750, 10_000, 10_000, 10_000, 0]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_keeps_polling() {
        let transport = MockTransport::with_responses(vec![
            Ok(accepted_response("snap_1")),
            Ok(progress_response("building")),
            Ok(progress_response("collecting")),
            Ok(progress_response("ready")),
            Ok(ApiResponse::new(200, r#"[{"ok": true}]"#)),
        ]);
        let client = make_client(transport.clone());

        let rows = client.submit_and_await(&request("instagram_posts")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(transport.request_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_carries_provider_message() {
        let transport = MockTransport::with_responses(vec![
            Ok(accepted_response("snap_1")),
            Ok(failed_response("target blocked the crawl")),
        ]);
        let client = make_client(transport);

        let err = client.submit_and_await(&request("instagram_posts")).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::JobFailed(msg) if msg == "target blocked the crawl"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_without_message_uses_default() {
        let transport = MockTransport::with_responses(vec![
            Ok(accepted_response("snap_1")),
            Ok(progress_response("failed")),
        ]);
        let client = make_client(transport);

        let err = client.submit_and_await(&request("instagram_posts")).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::JobFailed(msg) if msg == DEFAULT_FAILURE_MESSAGE
        ));
    }

    #[tokio::test]
    async fn missing_snapshot_id_fails_without_polling() {
        let transport = MockTransport::new(ApiResponse::new(202, "{}"));
        let client = make_client(transport.clone());

        let err = client.submit_and_await(&request("instagram_posts")).await.unwrap_err();
        assert!(matches!(err, AppError::ProtocolViolation(_)));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn submit_errors_map_through_taxonomy() {
        let transport = MockTransport::new(ApiResponse::new(401, "bad key"));
        let client = make_client(transport);
        let err = client.submit_and_await(&request("instagram_posts")).await.unwrap_err();
        assert!(matches!(err, AppError::AuthenticationFailed));
    }

    #[tokio::test(start_paused = true)]
    async fn progress_errors_abort_the_session() {
        let transport = MockTransport::with_responses(vec![
            Ok(accepted_response("snap_1")),
            Ok(ApiResponse::new(404, "snapshot expired")),
        ]);
        let client = make_client(transport.clone());

        let err = client.submit_and_await(&request("instagram_posts")).await.unwrap_err();
        assert!(matches!(err, AppError::DatasetNotFound(d) if d == "snapshot expired"));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_fetch_errors_abort_the_session() {
        let transport = MockTransport::with_responses(vec![
            Ok(accepted_response("snap_1")),
            Ok(progress_response("ready")),
            Ok(ApiResponse::new(429, "concurrency limit")),
        ]);
        let client = make_client(transport);

        let err = client.submit_and_await(&request("instagram_posts")).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited(d) if d == "concurrency limit"));
    }

    #[tokio::test(start_paused = true)]
    async fn network_errors_propagate_mid_poll() {
        let transport = MockTransport::with_responses(vec![
            Ok(accepted_response("snap_1")),
            Err(AppError::NetworkError("connection reset".into())),
        ]);
        let client = make_client(transport);

        let err = client.submit_and_await(&request("instagram_posts")).await.unwrap_err();
        assert!(matches!(err, AppError::NetworkError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn minimum_deadline_expires_mid_sleep() {
        // At the 5s minimum the schedule fits one poll: sleep 2s, poll,
        // then the 3s sleep ends exactly at the deadline and loses the
        // biased race. Expiring mid-sleep is accepted behavior.
        let mut responses = vec![Ok(accepted_response("snap_1"))];
        for _ in 0..5 {
            responses.push(Ok(progress_response("running")));
        }
        let transport = MockTransport::with_responses(responses);
        let config = make_test_config().with_timeout(Duration::from_secs(5));
        let client = ScrapeClient::new(transport.clone(), &config);

        let before = Instant::now();
        let err = client.submit_and_await(&request("instagram_posts")).await.unwrap_err();

        assert!(err.is_timeout(), "expected timeout, got {err:?}");
        assert_eq!(before.elapsed(), Duration::from_secs(5));
        // Submit plus exactly one progress poll; nothing is issued after
        // the deadline fires.
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_submit_can_consume_the_whole_deadline() {
        let transport = MockTransport::with_responses(vec![
            Ok(accepted_response("snap_1")),
            Ok(progress_response("running")),
        ])
        .with_delay(Duration::from_secs(6));
        let config = make_test_config().with_timeout(Duration::from_secs(5));
        let client = ScrapeClient::new(transport.clone(), &config);

        let before = Instant::now();
        let err = client.submit_and_await(&request("instagram_posts")).await.unwrap_err();

        assert!(err.is_timeout());
        // The in-flight submit was abandoned at the deadline, not awaited.
        assert_eq!(before.elapsed(), Duration::from_secs(5));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_covers_network_waits_during_polling() {
        let transport = MockTransport::with_responses(vec![
            Ok(accepted_response("snap_1")),
            Ok(progress_response("running")),
            Ok(progress_response("running")),
        ])
        .with_delay(Duration::from_secs(2));
        let config = make_test_config().with_timeout(Duration::from_secs(8));
        let client = ScrapeClient::new(transport.clone(), &config);

        let before = Instant::now();
        let err = client.submit_and_await(&request("instagram_posts")).await.unwrap_err();

        // t=0 submit (2s), t=2 submit done, sleep 2s, t=4 poll (2s),
        // t=6 running, sleep 3s ends at t=9 but the deadline fires at t=8.
        assert!(err.is_timeout());
        assert_eq!(before.elapsed(), Duration::from_secs(8));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_deadline_overrides_config_timeout() {
        let transport = MockTransport::with_responses(vec![
            Ok(accepted_response("snap_1")),
            Ok(progress_response("running")),
        ]);
        let client = make_client(transport.clone());

        let deadline = Deadline::after(Duration::from_secs(3));
        let err = client
            .submit_and_await_until(&request("instagram_posts"), deadline, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        // The 55s config timeout is ignored: the first 2s sleep and poll
        // fit, the next sleep hits the 3s deadline.
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_session_before_any_request() {
        let transport = MockTransport::new(ApiResponse::new(200, "[]"));
        let client = make_client(transport.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .submit_and_await_until(
                &request("instagram_posts"),
                Deadline::after(Duration::from_secs(60)),
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_spans_submit_and_polls() {
        let mut responses = vec![Ok(accepted_response("snap_1"))];
        for _ in 0..10 {
            responses.push(Ok(progress_response("running")));
        }
        let transport = MockTransport::with_responses(responses);
        let client = make_client(transport.clone());

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(6)).await;
            canceller.cancel();
        });

        let err = client
            .submit_and_await_until(
                &request("instagram_posts"),
                Deadline::after(Duration::from_secs(60)),
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        // Polls at t=2 and t=5 happen; the cancel at t=6 lands mid-sleep.
        assert_eq!(transport.request_count(), 3);
    }
}
