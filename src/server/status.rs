//! Job status endpoint.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{AppState, X_JOB_ID};
use crate::jobs::{Job, JobStatus};
use crate::types::JobId;

/// Errors from status lookups.
#[derive(Debug, Error)]
pub enum StatusError {
    /// The requested id is neither current nor in history.
    #[error("job {0} not found")]
    NotFound(JobId),

    /// No id was given and no job has ever run (or history was swept).
    #[error("no job has been run")]
    NoJob,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<&'a str>,
    message: String,
}

impl IntoResponse for StatusError {
    fn into_response(self) -> Response {
        let body = match &self {
            StatusError::NotFound(id) => ErrorBody {
                status: "not_found",
                job_id: Some(id.as_str()),
                message: self.to_string(),
            },
            StatusError::NoJob => ErrorBody {
                status: "no_job",
                job_id: None,
                message: self.to_string(),
            },
        };
        (StatusCode::NOT_FOUND, Json(body)).into_response()
    }
}

/// Query string of `GET /job/status`.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub job_id: Option<String>,
}

/// JSON view of a job.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub job_id: String,
    pub action: String,
    pub status: JobStatus,
    /// RFC 3339.
    pub started: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended: Option<String>,
    /// Seconds, measured to now while the job is in flight.
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobView {
    pub fn from_job(job: &Job, now: chrono::DateTime<Utc>) -> Self {
        let duration = job.duration(now);
        JobView {
            job_id: job.id().to_string(),
            action: job.action().to_string(),
            status: job.status(),
            started: job.start_time().to_rfc3339(),
            ended: job.end_time().map(|t| t.to_rfc3339()),
            duration: duration.num_milliseconds() as f64 / 1000.0,
            error: job.error().map(str::to_string),
        }
    }
}

/// HTTP status reported for a job in `status`.
pub fn http_status_for(status: JobStatus) -> StatusCode {
    match status {
        JobStatus::Pending | JobStatus::Running => StatusCode::ACCEPTED,
        JobStatus::Completed => StatusCode::OK,
        JobStatus::Failed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The id from `?job_id=`, else from the `X-Job-ID` header. Blank values
/// count as absent.
fn requested_id(query: &StatusQuery, headers: &HeaderMap) -> Option<JobId> {
    query
        .job_id
        .as_deref()
        .or_else(|| headers.get(X_JOB_ID).and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(JobId::new)
}

/// Job status handler.
///
/// # Request
///
/// - Method: GET
/// - Optional job id, as `?job_id=<id>` or the `X-Job-ID` header. Without
///   one, the current job (or else the most recent finished job) is shown.
///   A query string that does not parse is treated as absent.
///
/// # Response
///
/// - 202 Accepted: job pending or running
/// - 200 OK: job completed
/// - 500 Internal Server Error: job failed (`error` explains why)
/// - 404 Not Found: `{"status": "not_found"}` for an unknown id,
///   `{"status": "no_job"}` when there is nothing to show
///
/// # Example
///
/// ```ignore
/// GET /job/status?job_id=job_4f2a... HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: application/json
///
/// {
///   "job_id": "job_4f2a...",
///   "action": "update",
///   "status": "completed",
///   "started": "2024-01-15T12:00:00+00:00",
///   "ended": "2024-01-15T12:03:10+00:00",
///   "duration": 190.0
/// }
/// ```
pub async fn status_handler(
    State(app_state): State<AppState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Response, StatusError> {
    let store = app_state.store();
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            debug!(error = %rejection, "Ignoring malformed status query");
            StatusQuery::default()
        }
    };

    let job = match requested_id(&query, &headers) {
        Some(id) => {
            debug!(job_id = %id, "Status lookup");
            store.get_by_id(&id).ok_or(StatusError::NotFound(id))?
        }
        None => store
            .get_current()
            .or_else(|| store.latest_finished())
            .ok_or(StatusError::NoJob)?,
    };

    let view = JobView::from_job(&job, Utc::now());
    Ok((http_status_for(job.status()), Json(view)).into_response())
}
