//! Webhook endpoint handler.
//!
//! Validates, authenticates and admits an action request, then hands the
//! action to the worker pool and returns 202 Accepted. The action itself runs
//! on a worker; its outcome is visible through `GET /job/status`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use super::{AppState, MAX_BODY_BYTES, REPLAY_WINDOW_SECS, X_JOB_ID};
use crate::executor::ActionExecutor;
use crate::jobs::{Job, JobStore};
use crate::types::{JobId, UnknownAction, WebhookRequest};
use crate::worker::{PoolError, Task, panic_message};

/// Errors that end the webhook pipeline early.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The body could not be read or exceeded the size cap.
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// The body is not a valid action request.
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The timestamp is outside the replay window.
    #[error("request timestamp {timestamp} is outside the allowed window (server time {now})")]
    Expired { timestamp: i64, now: i64 },

    /// Missing or invalid signature.
    #[error("invalid signature")]
    InvalidSignature,

    /// The action tag is not recognized.
    #[error(transparent)]
    InvalidAction(#[from] UnknownAction),

    /// Another job holds the slot.
    #[error("job {} is already in progress", .0.id())]
    JobInProgress(Box<Job>),

    /// Admission raced and lost, but the winner already finished.
    #[error("another job is being admitted")]
    Busy,

    /// The worker pool could not take the job.
    #[error("server at capacity: {0}")]
    AtCapacity(PoolError, JobId),
}

/// Body of a `409 Conflict` response.
#[derive(Debug, Serialize)]
struct ConflictBody<'a> {
    status: &'static str,
    job_id: &'a str,
    action: &'a str,
    started: String,
    message: &'static str,
}

/// Body of a `202 Accepted` response.
#[derive(Debug, Serialize)]
struct AcceptedBody<'a> {
    status: &'static str,
    job_id: &'a str,
    action: &'a str,
    message: &'static str,
}

fn job_id_header(id: &JobId) -> Option<(&'static str, HeaderValue)> {
    HeaderValue::from_str(id.as_str()).ok().map(|v| (X_JOB_ID, v))
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            WebhookError::BodyRead(_)
            | WebhookError::InvalidJson(_)
            | WebhookError::Expired { .. }
            | WebhookError::InvalidAction(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            WebhookError::InvalidSignature => (StatusCode::UNAUTHORIZED, self.to_string()),
            WebhookError::JobInProgress(job) => {
                let body = ConflictBody {
                    status: "job_in_progress",
                    job_id: job.id().as_str(),
                    action: job.action().as_str(),
                    started: job.start_time().to_rfc3339(),
                    message: "Another job is already in progress",
                };
                let mut response = (StatusCode::CONFLICT, Json(body)).into_response();
                if let Some((name, value)) = job_id_header(job.id()) {
                    response.headers_mut().insert(name, value);
                }
                return response;
            }
            WebhookError::Busy => (StatusCode::CONFLICT, self.to_string()),
            WebhookError::AtCapacity(_, job_id) => {
                let mut response =
                    (StatusCode::SERVICE_UNAVAILABLE, self.to_string()).into_response();
                if let Some((name, value)) = job_id_header(job_id) {
                    response.headers_mut().insert(name, value);
                }
                return response;
            }
        };

        (status, message).into_response()
    }
}

/// Reads the body, failing once it exceeds [`MAX_BODY_BYTES`].
async fn read_body(body: Body) -> Result<Bytes, WebhookError> {
    axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| WebhookError::BodyRead(e.to_string()))
}

/// Rejects timestamps more than [`REPLAY_WINDOW_SECS`] away from `now` in
/// either direction.
pub fn check_replay_window(timestamp: i64, now: i64) -> Result<(), WebhookError> {
    let expired = now
        .checked_sub(timestamp)
        .is_none_or(|skew| skew.unsigned_abs() > REPLAY_WINDOW_SECS);
    if expired {
        return Err(WebhookError::Expired { timestamp, now });
    }
    Ok(())
}

/// Webhook handler.
///
/// Runs the admission pipeline in order, stopping at the first failure:
/// body read, JSON parse, replay window, signature, action, single-slot
/// admission, pool submission.
///
/// # Request
///
/// - Method: POST
/// - Required headers:
///   - `X-Cloud-Update-Signature`: `sha256=<hex>` HMAC-SHA256 of the body
/// - Body: JSON `{"action": "...", "module": "..."?, "config": {...}?, "timestamp": <unix>}`
///   (at most 1 MiB)
///
/// # Response
///
/// - 202 Accepted: job admitted; `X-Job-ID` header and JSON body
/// - 400 Bad Request: unreadable body, invalid JSON, stale timestamp, unknown action
/// - 401 Unauthorized: missing or invalid signature
/// - 409 Conflict: a job is already running; JSON body names it
/// - 503 Service Unavailable: worker pool full or shut down
///
/// # Example
///
/// ```ignore
/// POST /webhook HTTP/1.1
/// X-Cloud-Update-Signature: sha256=...
/// Content-Type: application/json
///
/// {"action": "update", "timestamp": 1700000000}
///
/// HTTP/1.1 202 Accepted
/// X-Job-ID: job_4f2a...
///
/// {"status": "accepted", "job_id": "job_4f2a...", "action": "update", "message": "..."}
/// ```
#[instrument(skip_all)]
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, WebhookError> {
    let body = read_body(body).await?;
    let request: WebhookRequest = serde_json::from_slice(&body)?;

    debug!(action = %request.action, timestamp = request.timestamp, "Received webhook");

    if let Err(e) = check_replay_window(request.timestamp, Utc::now().timestamp()) {
        warn!(error = %e, "Rejecting stale webhook");
        return Err(e);
    }

    if !app_state.authenticator().validate(&headers, &body) {
        warn!("Invalid webhook signature");
        return Err(WebhookError::InvalidSignature);
    }

    let action = request.parsed_action()?;
    let store = app_state.store();

    if let Some(current) = store.get_current() {
        info!(running = %current.id(), "Rejecting webhook, job in progress");
        return Err(WebhookError::JobInProgress(Box::new(current)));
    }

    let job_id = JobId::generate();
    if !store.try_start(Job::new(job_id.clone(), action)) {
        // Lost the race to a concurrent request.
        return Err(match store.get_current() {
            Some(current) => WebhookError::JobInProgress(Box::new(current)),
            None => WebhookError::Busy,
        });
    }

    let task = job_task(
        Arc::clone(app_state.store()),
        Arc::clone(app_state.executor()),
        request,
        job_id.clone(),
    );
    if let Err(e) = app_state.pool().submit(task) {
        error!(job_id = %job_id, error = %e, "Worker pool rejected job");
        store.fail_job(&job_id, format!("failed to schedule job: {e}"));
        return Err(WebhookError::AtCapacity(e, job_id));
    }

    info!(job_id = %job_id, action = %action, "Job accepted");

    let body = AcceptedBody {
        status: "accepted",
        job_id: job_id.as_str(),
        action: action.as_str(),
        message: "Action accepted for processing",
    };
    let mut response = (StatusCode::ACCEPTED, Json(body)).into_response();
    if let Some((name, value)) = job_id_header(&job_id) {
        response.headers_mut().insert(name, value);
    }
    Ok(response)
}

/// The worker-side half of a job: run the action and record its outcome.
///
/// A panic in the executor is caught here and fails the job, so the store
/// never keeps a running job whose task is gone.
fn job_task(
    store: Arc<JobStore>,
    executor: Arc<dyn ActionExecutor>,
    request: WebhookRequest,
    job_id: JobId,
) -> Task {
    Task::new(job_id.to_string(), move |ctx| async move {
        if ctx.is_cancelled() {
            warn!(job_id = %job_id, "Job cancelled before it started");
            store.fail_job(&job_id, "job cancelled before it started");
            return;
        }

        let outcome = AssertUnwindSafe(executor.process_action(&request, &job_id, &ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                info!(job_id = %job_id, "Job completed");
                store.complete_job(&job_id);
            }
            Ok(Err(e)) => {
                warn!(job_id = %job_id, error = %e, "Job failed");
                store.fail_job(&job_id, e.to_string());
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(job_id = %job_id, panic = %message, "Action panicked");
                store.fail_job(&job_id, format!("action panicked: {message}"));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_window_is_symmetric() {
        let now = 1_700_000_000;
        assert!(check_replay_window(now, now).is_ok());
        assert!(check_replay_window(now - 300, now).is_ok());
        assert!(check_replay_window(now + 300, now).is_ok());
        assert!(check_replay_window(now - 301, now).is_err());
        assert!(check_replay_window(now + 301, now).is_err());
    }

    #[test]
    fn replay_window_handles_extremes() {
        assert!(check_replay_window(i64::MIN, 1_700_000_000).is_err());
        assert!(check_replay_window(i64::MAX, 1_700_000_000).is_err());
        assert!(check_replay_window(0, 1_700_000_000).is_err());
    }

    #[test]
    fn error_status_codes() {
        let cases: Vec<(WebhookError, StatusCode)> = vec![
            (WebhookError::BodyRead("x".into()), StatusCode::BAD_REQUEST),
            (
                WebhookError::Expired {
                    timestamp: 0,
                    now: 1000,
                },
                StatusCode::BAD_REQUEST,
            ),
            (WebhookError::InvalidSignature, StatusCode::UNAUTHORIZED),
            (
                WebhookError::InvalidAction(UnknownAction("shutdown".into())),
                StatusCode::BAD_REQUEST,
            ),
            (WebhookError::Busy, StatusCode::CONFLICT),
            (
                WebhookError::AtCapacity(PoolError::QueueFull, JobId::new("job_x")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
