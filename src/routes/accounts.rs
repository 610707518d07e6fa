//! Read-only account view: `GET /accounts/{id}`

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::{error_response, json_response};
use crate::server::AppState;

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub account_id: String,
    /// Spendable balance; escrowed bids are already deducted
    pub tribet_balance: u64,
    pub is_bidding: bool,
    /// Networks on which this account holds the standing bid
    pub standing_bids: Vec<String>,
}

pub async fn handle_get_account(state: &AppState, account_id: &str) -> Response<Full<Bytes>> {
    match state.service.get_account(account_id).await {
        Ok(account) => json_response(
            StatusCode::OK,
            &AccountResponse {
                is_bidding: account.is_bidding(),
                account_id: account.account_id,
                tribet_balance: account.tribet_balance,
                standing_bids: account.standing_bids.into_iter().collect(),
            },
        ),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{body_json, state};

    #[tokio::test]
    async fn test_account_view() {
        let (state, _) = state().await;
        state.service.open_for_acquisition("net-1", "admin").await.unwrap();
        state.service.place_bid("net-1", "bob", 120).await.unwrap();

        let body = body_json(handle_get_account(&state, "bob").await).await;
        assert_eq!(body["tribetBalance"], 180);
        assert_eq!(body["isBidding"], true);
        assert_eq!(body["standingBids"][0], "net-1");

        let response = handle_get_account(&state, "nobody").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
