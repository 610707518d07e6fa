//! HTTP routes for the auction service
//!
//! - `GET /health`, `/healthz`: liveness
//! - `GET /networks/{id}/auction`: auction status
//! - `POST /networks/{id}/auction/{open|floor|close|bids|claim}`: operations
//! - `GET /accounts/{id}`: balance and bidding flag

pub mod accounts;
pub mod auction;
pub mod health;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use crate::server::AppState;
use crate::types::AuctionError;

pub use health::health_check;

/// Error body returned by every route
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub retryable: bool,
}

/// Route a request with an already-collected body
pub async fn dispatch(
    state: &AppState,
    method: &Method,
    path: &str,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match (method, segments.as_slice()) {
        (&Method::OPTIONS, _) => preflight_response(),

        (&Method::GET, ["health"]) | (&Method::GET, ["healthz"]) => {
            health::health_check(state).await
        }

        (&Method::GET, ["networks", network_id, "auction"]) => {
            auction::handle_status(state, network_id).await
        }
        (&Method::POST, ["networks", network_id, "auction", action]) => {
            auction::handle_action(state, network_id, action, &body).await
        }

        (&Method::GET, ["accounts", account_id]) => {
            accounts::handle_get_account(state, account_id).await
        }

        _ => not_found_response(path),
    }
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Cache-Control", "no-store")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// Map an operation failure to its JSON error response
pub fn error_response(err: &AuctionError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    if status.is_server_error() {
        if err.is_retryable() {
            warn!(code = err.code(), "Transient failure: {}", err);
        } else {
            error!(code = err.code(), "Operation failed: {}", err);
        }
    }

    let mut response = json_response(
        status,
        &ErrorResponse {
            error: err.to_string(),
            code: err.code(),
            retryable: err.is_retryable(),
        },
    );
    if err.is_retryable() {
        response
            .headers_mut()
            .insert("Retry-After", hyper::header::HeaderValue::from_static("1"));
    }
    response
}

/// Bad request response
pub fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::BAD_REQUEST,
        &ErrorResponse {
            error: message.to_string(),
            code: "BAD_REQUEST",
            retryable: false,
        },
    )
}

/// Not found response
pub fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &ErrorResponse {
            error: format!("No route for {}", path),
            code: "NOT_FOUND",
            retryable: false,
        },
    )
}

/// CORS preflight response
pub fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Parse a JSON request body
pub fn parse_json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response<Full<Bytes>>> {
    if body.is_empty() {
        return Err(bad_request_response("Request body is required"));
    }
    serde_json::from_slice(body).map_err(|e| bad_request_response(&format!("Invalid JSON: {}", e)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::auction::AuctionService;
    use crate::config::{Args, AuctionConfig};
    use crate::model::{Account, Network};
    use crate::store::{AuctionStore, ManualClock, MemoryStore};
    use clap::Parser;
    use http_body_util::BodyExt;
    use std::sync::Arc;

    pub async fn state() -> (AppState, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        store.insert_network(Network::new("net-1", "admin")).await.unwrap();
        for (id, balance) in [("admin", 0), ("alice", 500), ("bob", 300)] {
            store.insert_account(Account::new(id, balance)).await.unwrap();
        }
        let clock = Arc::new(ManualClock::default());
        let service = AuctionService::new(store, clock.clone(), AuctionConfig::default());
        let args = Args::parse_from(["network-auction"]);
        (AppState::new(args, Arc::new(service)), clock)
    }

    pub async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}
