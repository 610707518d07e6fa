//! Auction routes
//!
//! `GET /networks/{id}/auction` returns the status view.
//! `POST /networks/{id}/auction/{action}` runs one operation:
//!
//! | action  | body                      | result          |
//! |---------|---------------------------|-----------------|
//! | `open`  | `{callerId}`              | ack             |
//! | `floor` | `{callerId, value}`       | ack             |
//! | `close` | `{callerId}`              | ack             |
//! | `bids`  | `{callerId, amount}`      | bid receipt     |
//! | `claim` | `{callerId}`              | transfer receipt|

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{
    bad_request_response, error_response, json_response, not_found_response, parse_json_body,
};
use crate::server::AppState;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CallerRequest {
    pub caller_id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FloorRequest {
    pub caller_id: String,
    pub value: u64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BidRequest {
    pub caller_id: String,
    pub amount: u64,
}

/// Acknowledgement for admin transitions
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse<'a> {
    pub ok: bool,
    pub network_id: &'a str,
    pub operation: &'a str,
}

/// GET /networks/{id}/auction
pub async fn handle_status(state: &AppState, network_id: &str) -> Response<Full<Bytes>> {
    match state.service.get_auction_status(network_id).await {
        Ok(status) => json_response(StatusCode::OK, &status),
        Err(e) => error_response(&e),
    }
}

/// POST /networks/{id}/auction/{action}
pub async fn handle_action(
    state: &AppState,
    network_id: &str,
    action: &str,
    body: &[u8],
) -> Response<Full<Bytes>> {
    match action {
        "open" | "close" => {
            let request: CallerRequest = match parse_caller(body) {
                Ok(r) => r,
                Err(resp) => return resp,
            };
            let result = if action == "open" {
                state
                    .service
                    .open_for_acquisition(network_id, &request.caller_id)
                    .await
            } else {
                state
                    .service
                    .close_acquisition(network_id, &request.caller_id)
                    .await
            };
            ack(result, network_id, action)
        }
        "floor" => {
            let request: FloorRequest = match parse_caller(body) {
                Ok(r) => r,
                Err(resp) => return resp,
            };
            let result = state
                .service
                .set_floor_value(network_id, &request.caller_id, request.value)
                .await;
            ack(result, network_id, action)
        }
        "bids" => {
            let request: BidRequest = match parse_caller(body) {
                Ok(r) => r,
                Err(resp) => return resp,
            };
            match state
                .service
                .place_bid(network_id, &request.caller_id, request.amount)
                .await
            {
                Ok(receipt) => json_response(StatusCode::OK, &receipt),
                Err(e) => error_response(&e),
            }
        }
        "claim" => {
            let request: CallerRequest = match parse_caller(body) {
                Ok(r) => r,
                Err(resp) => return resp,
            };
            match state
                .service
                .claim_ownership(network_id, &request.caller_id)
                .await
            {
                Ok(receipt) => json_response(StatusCode::OK, &receipt),
                Err(e) => error_response(&e),
            }
        }
        _ => not_found_response(&format!("/networks/{}/auction/{}", network_id, action)),
    }
}

/// Every request body names its caller; an empty id is rejected here
trait HasCaller {
    fn caller_id(&self) -> &str;
}

impl HasCaller for CallerRequest {
    fn caller_id(&self) -> &str {
        &self.caller_id
    }
}

impl HasCaller for FloorRequest {
    fn caller_id(&self) -> &str {
        &self.caller_id
    }
}

impl HasCaller for BidRequest {
    fn caller_id(&self) -> &str {
        &self.caller_id
    }
}

fn parse_caller<T>(body: &[u8]) -> Result<T, Response<Full<Bytes>>>
where
    T: HasCaller + serde::de::DeserializeOwned,
{
    let request: T = parse_json_body(body)?;
    if request.caller_id().trim().is_empty() {
        return Err(bad_request_response("callerId must not be empty"));
    }
    Ok(request)
}

fn ack(result: crate::Result<()>, network_id: &str, operation: &str) -> Response<Full<Bytes>> {
    match result {
        Ok(()) => json_response(
            StatusCode::OK,
            &AckResponse {
                ok: true,
                network_id,
                operation,
            },
        ),
        Err(e) => error_response(&e),
    }
}
