//! Health check endpoint for liveness probes.
//!
//! Returns 200 OK if the server is running. Not rate limited, so that load
//! balancers and orchestrators can probe it freely.

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

/// Service name reported by the health check.
pub const SERVICE_NAME: &str = "cloud-update";

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthBody {
    pub status: &'static str,
    pub service: &'static str,
    /// Unix seconds, as a string.
    pub timestamp: String,
}

/// Health check handler.
///
/// # Example
///
/// ```ignore
/// GET /health HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: application/json
///
/// {"status": "healthy", "service": "cloud-update", "timestamp": "1700000000"}
/// ```
pub async fn health_handler() -> (StatusCode, Json<HealthBody>) {
    let body = HealthBody {
        status: "healthy",
        service: SERVICE_NAME,
        timestamp: chrono::Utc::now().timestamp().to_string(),
    };
    (StatusCode::OK, Json(body))
}
