//! HTTP server for the cloud-update service.
//!
//! This module implements the HTTP server that:
//! - Accepts signed action requests, admits at most one job at a time and
//!   runs it on the worker pool
//! - Reports job status
//! - Provides health checks for liveness probes
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts an action request (returns 202 Accepted)
//! - `GET /job/status` - Returns the state of a job as JSON
//! - `GET /health` - Returns 200 if server is running
//!
//! `/webhook` and `/job/status` are rate limited per client IP.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod health;
pub mod status;
pub mod webhook;

pub use health::health_handler;
pub use status::{StatusError, status_handler};
pub use webhook::{WebhookError, webhook_handler};

use crate::executor::ActionExecutor;
use crate::jobs::{DEFAULT_CLEANUP_INTERVAL, DEFAULT_MAX_JOB_AGE, JobStore};
use crate::ratelimit::{CLEANUP_INTERVAL, RateLimitState, RateLimiter, rate_limit};
use crate::webhooks::Authenticator;
use crate::worker::WorkerPool;

/// Header carrying a job id, in responses and status queries.
pub const X_JOB_ID: &str = "x-job-id";

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Maximum distance between a request's timestamp and server time.
pub const REPLAY_WINDOW_SECS: u64 = 5 * 60;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    authenticator: Authenticator,
    store: Arc<JobStore>,
    pool: Arc<WorkerPool>,
    executor: Arc<dyn ActionExecutor>,
    limiter: Arc<RateLimiter>,
    /// Whether the rate limiter may key on forwarded-for headers.
    trust_proxy_headers: bool,
}

impl AppState {
    pub fn new(
        authenticator: Authenticator,
        store: Arc<JobStore>,
        pool: Arc<WorkerPool>,
        executor: Arc<dyn ActionExecutor>,
        limiter: Arc<RateLimiter>,
        trust_proxy_headers: bool,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                authenticator,
                store,
                pool,
                executor,
                limiter,
                trust_proxy_headers,
            }),
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.inner.authenticator
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.inner.store
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.inner.pool
    }

    pub fn executor(&self) -> &Arc<dyn ActionExecutor> {
        &self.inner.executor
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.inner.limiter
    }

    pub fn trust_proxy_headers(&self) -> bool {
        self.inner.trust_proxy_headers
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    let rate_limit_state = RateLimitState {
        limiter: Arc::clone(app_state.limiter()),
        trust_forwarded_headers: app_state.trust_proxy_headers(),
    };

    let limited = axum::Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/job/status", get(status_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            rate_limit_state,
            rate_limit,
        ));

    axum::Router::new()
        .merge(limited)
        .route("/health", get(health_handler))
        .with_state(app_state)
}

/// Starts the periodic maintenance tasks: the hourly job-history sweep and
/// the per-minute rate limiter sweep. All stop when `shutdown` fires.
pub fn spawn_background_tasks(
    app_state: &AppState,
    shutdown: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    vec![
        app_state.store().spawn_cleanup(
            DEFAULT_CLEANUP_INTERVAL,
            DEFAULT_MAX_JOB_AGE,
            shutdown.clone(),
        ),
        app_state
            .limiter()
            .spawn_cleanup(CLEANUP_INTERVAL, shutdown.clone()),
    ]
}


#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::ratelimit::RateLimitConfig;
    use crate::test_utils::FakeExecutor;
    use crate::webhooks::SIGNATURE_HEADER;
    use crate::worker::{PoolConfig, Task};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    struct Harness {
        app: axum::Router,
        state: AppState,
        executor: Arc<FakeExecutor>,
    }

    fn harness_with(
        executor: Arc<FakeExecutor>,
        pool: PoolConfig,
        limits: RateLimitConfig,
    ) -> Harness {
        let state = AppState::new(
            Authenticator::new(SECRET).unwrap(),
            Arc::new(JobStore::new()),
            Arc::new(WorkerPool::new(pool)),
            executor.clone(),
            Arc::new(RateLimiter::new(limits)),
            true,
        );
        Harness {
            app: build_router(state.clone()),
            state,
            executor,
        }
    }

    fn harness(executor: Arc<FakeExecutor>) -> Harness {
        harness_with(
            executor,
            PoolConfig::new(2, 4),
            RateLimitConfig::new(1000.0, 1000),
        )
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn action_body(action: &str, timestamp: i64) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({ "action": action, "timestamp": timestamp }))
            .unwrap()
    }

    /// Creates a webhook request carrying a valid signature for `body`.
    fn signed_request(body: Vec<u8>) -> Request<Body> {
        let signature = Authenticator::new(SECRET).unwrap().sign(&body);
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .unwrap()
    }

    fn status_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn job_id_of(response: &Response) -> String {
        response
            .headers()
            .get(X_JOB_ID)
            .expect("X-Job-ID header")
            .to_str()
            .unwrap()
            .to_string()
    }

    /// Polls the status endpoint until the job reports `expected`.
    async fn wait_for_status(
        app: &axum::Router,
        job_id: &str,
        expected: &str,
    ) -> (StatusCode, serde_json::Value) {
        for _ in 0..200 {
            let response = app
                .clone()
                .oneshot(status_request(&format!("/job/status?job_id={job_id}")))
                .await
                .unwrap();
            let status = response.status();
            let json = body_json(response).await;
            if json["status"] == expected {
                return (status, json);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never reached status {expected}");
    }

    fn assert_no_job_created(state: &AppState) {
        assert!(state.store().get_current().is_none());
        assert!(state.store().history().is_empty());
    }

    // ─── Health endpoint tests ───

    #[tokio::test]
    async fn health_returns_200() {
        let h = harness(FakeExecutor::succeeding());

        let response = h.app.oneshot(status_request("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "cloud-update");
        assert!(json["timestamp"].as_str().unwrap().parse::<i64>().is_ok());
    }

    #[tokio::test]
    async fn health_is_not_rate_limited() {
        let h = harness_with(
            FakeExecutor::succeeding(),
            PoolConfig::new(1, 1),
            RateLimitConfig::new(1.0, 1),
        );

        for _ in 0..3 {
            let response = h
                .app
                .clone()
                .oneshot(status_request("/health"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    // ─── Webhook endpoint tests ───

    #[tokio::test]
    async fn webhook_valid_returns_202_and_runs_action() {
        let h = harness(FakeExecutor::succeeding());

        let response = h
            .app
            .oneshot(signed_request(action_body("update", now())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        let job_id = job_id_of(&response);
        let json = body_json(response).await;
        assert_eq!(json["status"], "accepted");
        assert_eq!(json["job_id"], job_id.as_str());
        assert_eq!(json["action"], "update");

        assert!(h.executor.wait_for_calls(1, Duration::from_millis(100)).await);
        assert_eq!(
            h.executor.calls(),
            vec![(crate::types::JobId::new(job_id), "update".to_string())]
        );
    }

    #[tokio::test]
    async fn webhook_stale_timestamp_returns_400() {
        let h = harness(FakeExecutor::succeeding());

        let response = h
            .app
            .oneshot(signed_request(action_body("update", now() - 600)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_no_job_created(&h.state);
        assert!(h.executor.calls().is_empty());
    }

    #[tokio::test]
    async fn webhook_future_timestamp_returns_400() {
        let h = harness(FakeExecutor::succeeding());

        let response = h
            .app
            .oneshot(signed_request(action_body("update", now() + 600)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_no_job_created(&h.state);
    }

    #[tokio::test]
    async fn webhook_invalid_signature_returns_401() {
        let h = harness(FakeExecutor::succeeding());

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header(SIGNATURE_HEADER, format!("sha256={}", "deadbeef".repeat(8)))
            .body(Body::from(action_body("update", now())))
            .unwrap();
        let response = h.app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_no_job_created(&h.state);
    }

    #[tokio::test]
    async fn webhook_missing_signature_returns_401() {
        let h = harness(FakeExecutor::succeeding());

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .body(Body::from(action_body("reboot", now())))
            .unwrap();
        let response = h.app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn webhook_unknown_action_returns_400() {
        let h = harness(FakeExecutor::succeeding());

        for action in ["shutdown", "execute_script", "upgrade", "restart", ""] {
            let response = h
                .app
                .clone()
                .oneshot(signed_request(action_body(action, now())))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{action}");
        }
        assert_no_job_created(&h.state);
    }

    #[tokio::test]
    async fn webhook_invalid_json_returns_400() {
        let h = harness(FakeExecutor::succeeding());

        let response = h
            .app
            .clone()
            .oneshot(signed_request(b"{not json".to_vec()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Timestamp is required.
        let response = h
            .app
            .oneshot(signed_request(br#"{"action":"update"}"#.to_vec()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wrong_methods_return_405() {
        let h = harness(FakeExecutor::succeeding());

        let response = h
            .app
            .clone()
            .oneshot(status_request("/webhook"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let request = Request::builder()
            .method("POST")
            .uri("/job/status")
            .body(Body::empty())
            .unwrap();
        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn body_at_limit_accepted_and_over_limit_rejected() {
        let h = harness(FakeExecutor::succeeding());

        let mut body = action_body("update", now());
        body.resize(MAX_BODY_BYTES, b' ');
        let response = h
            .app
            .clone()
            .oneshot(signed_request(body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        body.push(b' ');
        let response = h.app.oneshot(signed_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn second_request_while_running_returns_409() {
        let h = harness(FakeExecutor::blocking());

        let first = h
            .app
            .clone()
            .oneshot(signed_request(action_body("update", now())))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);
        let first_id = job_id_of(&first);

        let second = h
            .app
            .clone()
            .oneshot(signed_request(action_body("reboot", now())))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(job_id_of(&second), first_id);

        let json = body_json(second).await;
        assert_eq!(json["status"], "job_in_progress");
        assert_eq!(json["job_id"], first_id.as_str());
        assert_eq!(json["action"], "update");
        assert!(json["started"].is_string());
        assert!(json["message"].is_string());

        h.executor.release();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_admit_exactly_one() {
        let h = harness(FakeExecutor::blocking());

        let requests: Vec<_> = (0..8)
            .map(|_| {
                let app = h.app.clone();
                tokio::spawn(async move {
                    app.oneshot(signed_request(action_body("update", now())))
                        .await
                        .unwrap()
                        .status()
                })
            })
            .collect();

        let mut statuses = Vec::new();
        for request in requests {
            statuses.push(request.await.unwrap());
        }

        let accepted = statuses
            .iter()
            .filter(|s| **s == StatusCode::ACCEPTED)
            .count();
        assert_eq!(accepted, 1);
        assert!(
            statuses
                .iter()
                .all(|s| *s == StatusCode::ACCEPTED || *s == StatusCode::CONFLICT)
        );

        h.executor.release();
    }

    #[tokio::test]
    async fn pool_saturation_returns_503_and_fails_job() {
        let h = harness_with(
            FakeExecutor::succeeding(),
            PoolConfig::new(1, 1),
            RateLimitConfig::new(1000.0, 1000),
        );
        let release = tokio_util::sync::CancellationToken::new();

        // Occupy the only worker, then the only queue slot.
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let latch = release.clone();
        h.state
            .pool()
            .submit(Task::new("long-1", move |_ctx| async move {
                let _ = started_tx.send(());
                latch.cancelled().await;
            }))
            .unwrap();
        started_rx.await.unwrap();
        let latch = release.clone();
        h.state
            .pool()
            .submit(Task::new("long-2", move |_ctx| async move {
                latch.cancelled().await;
            }))
            .unwrap();

        let response = h
            .app
            .oneshot(signed_request(action_body("update", now())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let job_id = job_id_of(&response);

        let job = h.state.store().latest_finished().unwrap();
        assert_eq!(job.id().as_str(), job_id);
        assert_eq!(job.status(), crate::jobs::JobStatus::Failed);
        assert!(h.state.store().get_current().is_none());

        release.cancel();
    }

    #[tokio::test]
    async fn pool_shut_down_returns_503() {
        let h = harness(FakeExecutor::succeeding());
        h.state
            .pool()
            .shutdown(Duration::from_secs(1))
            .await
            .unwrap();

        let response = h
            .app
            .oneshot(signed_request(action_body("update", now())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(h.state.store().get_current().is_none());
    }

    #[tokio::test]
    async fn queued_job_fails_when_pool_gives_up_on_shutdown() {
        let h = harness_with(
            FakeExecutor::succeeding(),
            PoolConfig::new(1, 1),
            RateLimitConfig::new(1000.0, 1000),
        );

        // Occupy the only worker until the pool cancels it.
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        h.state
            .pool()
            .submit(Task::new("occupy", move |ctx| async move {
                let _ = started_tx.send(());
                ctx.cancelled().await;
            }))
            .unwrap();
        started_rx.await.unwrap();

        let response = h
            .app
            .clone()
            .oneshot(signed_request(action_body("update", now())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let job_id = job_id_of(&response);

        assert_eq!(
            h.state.pool().shutdown(Duration::ZERO).await,
            Err(crate::worker::PoolError::ShutdownTimeout)
        );

        let (status, json) = wait_for_status(&h.app, &job_id, "failed").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("cancelled"));
        assert!(h.executor.calls().is_empty());
        assert!(h.state.store().get_current().is_none());
    }

    #[tokio::test]
    async fn running_job_fails_when_pool_gives_up_on_shutdown() {
        let h = harness_with(
            FakeExecutor::blocking(),
            PoolConfig::new(1, 1),
            RateLimitConfig::new(1000.0, 1000),
        );

        let response = h
            .app
            .clone()
            .oneshot(signed_request(action_body("reboot", now())))
            .await
            .unwrap();
        let job_id = job_id_of(&response);
        assert!(h.executor.wait_for_calls(1, Duration::from_secs(1)).await);

        assert_eq!(
            h.state.pool().shutdown(Duration::ZERO).await,
            Err(crate::worker::PoolError::ShutdownTimeout)
        );

        let (status, json) = wait_for_status(&h.app, &job_id, "failed").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "action cancelled");
    }

    #[tokio::test]
    async fn rate_limited_client_gets_429() {
        let h = harness_with(
            FakeExecutor::succeeding(),
            PoolConfig::new(1, 1),
            RateLimitConfig::new(1.0, 1),
        );

        let from_client = |body: Vec<u8>| {
            let mut request = signed_request(body);
            request
                .headers_mut()
                .insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
            request
        };

        let first = h
            .app
            .clone()
            .oneshot(from_client(action_body("update", now())))
            .await
            .unwrap();
        assert_ne!(first.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(first.headers().get("x-ratelimit-limit").unwrap(), "1");

        let second = h
            .app
            .oneshot(from_client(action_body("update", now())))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers().get("x-ratelimit-limit").unwrap(), "1");
        assert_eq!(second.headers().get("x-ratelimit-remaining").unwrap(), "0");
        assert_eq!(second.headers().get("retry-after").unwrap(), "1");
        assert!(second.headers().get("x-ratelimit-reset").is_some());
    }

    // ─── Status endpoint tests ───

    #[tokio::test]
    async fn status_running_then_completed() {
        let h = harness(FakeExecutor::blocking());

        let response = h
            .app
            .clone()
            .oneshot(signed_request(action_body("update", now())))
            .await
            .unwrap();
        let job_id = job_id_of(&response);

        let (status, json) = wait_for_status(&h.app, &job_id, "running").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["job_id"], job_id.as_str());
        assert!(json.get("ended").is_none());

        h.executor.release();

        let (status, json) = wait_for_status(&h.app, &job_id, "completed").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["ended"].is_string());
        assert!(json["duration"].is_number());
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn status_failed_after_panic() {
        let h = harness(FakeExecutor::panicking("action exploded"));

        let response = h
            .app
            .clone()
            .oneshot(signed_request(action_body("reinit", now())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let job_id = job_id_of(&response);

        let (status, json) = wait_for_status(&h.app, &job_id, "failed").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("action exploded"));

        // The slot is free again.
        let response = h
            .app
            .oneshot(signed_request(action_body("reinit", now())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn status_failed_after_executor_error() {
        let h = harness(FakeExecutor::failing("apt-get exploded"));

        let response = h
            .app
            .clone()
            .oneshot(signed_request(action_body("update", now())))
            .await
            .unwrap();
        let job_id = job_id_of(&response);

        let (status, json) = wait_for_status(&h.app, &job_id, "failed").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("apt-get exploded"));
    }

    #[tokio::test]
    async fn status_by_header_and_latest_without_id() {
        let h = harness(FakeExecutor::succeeding());

        let response = h
            .app
            .clone()
            .oneshot(signed_request(action_body("reboot", now())))
            .await
            .unwrap();
        let job_id = job_id_of(&response);
        wait_for_status(&h.app, &job_id, "completed").await;

        let request = Request::builder()
            .uri("/job/status")
            .header(X_JOB_ID, job_id.as_str())
            .body(Body::empty())
            .unwrap();
        let response = h.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["job_id"], job_id.as_str());

        let response = h
            .app
            .oneshot(status_request("/job/status"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["job_id"], job_id.as_str());
        assert_eq!(json["action"], "reboot");
    }

    #[tokio::test]
    async fn status_malformed_query_falls_back_to_header_and_latest() {
        let h = harness(FakeExecutor::succeeding());

        let response = h
            .app
            .clone()
            .oneshot(signed_request(action_body("update", now())))
            .await
            .unwrap();
        let job_id = job_id_of(&response);
        wait_for_status(&h.app, &job_id, "completed").await;

        let response = h
            .app
            .clone()
            .oneshot(status_request("/job/status?job_id=a&job_id=b"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert_eq!(body_json(response).await["job_id"], job_id.as_str());

        let request = Request::builder()
            .uri("/job/status?job_id=a&job_id=b")
            .header(X_JOB_ID, "job_missing")
            .body(Body::empty())
            .unwrap();
        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["status"], "not_found");
        assert_eq!(json["job_id"], "job_missing");
    }

    #[tokio::test]
    async fn status_unknown_id_returns_404_not_found() {
        let h = harness(FakeExecutor::succeeding());

        let response = h
            .app
            .oneshot(status_request("/job/status?job_id=job_missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["status"], "not_found");
        assert_eq!(json["job_id"], "job_missing");
    }

    #[tokio::test]
    async fn status_without_any_job_returns_404_no_job() {
        let h = harness(FakeExecutor::succeeding());

        let response = h
            .app
            .oneshot(status_request("/job/status"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["status"], "no_job");
    }
}
