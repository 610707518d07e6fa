//! Health check endpoint
//!
//! `/health` and `/healthz` are liveness checks: they return 200 whenever the
//! process is serving. A store whose clock cannot be read is reported as
//! `degraded` in the body so operators can tell the two apart.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::server::AppState;

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    /// `online` or `degraded`
    pub status: &'static str,
    pub version: &'static str,
    /// Seconds since this instance started
    pub uptime: u64,
    /// Trusted server time, absent if the clock source is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time: Option<String>,
    pub mode: &'static str,
    pub node_id: String,
    pub store: &'static str,
    pub bid_window_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness check
pub async fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let (server_time, error) = match state.service.server_time().await {
        Ok(now) => (Some(now.to_rfc3339()), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let body = HealthResponse {
        healthy: true,
        status: if error.is_none() { "online" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        server_time,
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        node_id: state.args.node_id.to_string(),
        store: state.service.store().backend(),
        bid_window_secs: state.service.config().bid_window_secs,
        error,
    };

    json_response(StatusCode::OK, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{body_json, state};

    #[tokio::test]
    async fn test_health_reports_backend_and_time() {
        let (state, _) = state().await;
        let response = health_check(&state).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["healthy"], true);
        assert_eq!(body["status"], "online");
        assert_eq!(body["store"], "memory");
        assert_eq!(body["bidWindowSecs"], 60);
        assert!(body["serverTime"].is_string());
        assert!(body.get("error").is_none());
    }
}
