use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::json;

use super::{dispatch, error_response, json_body, ApiResponse, AppState};
use crate::models::withdrawals::{ProcessWithdrawal, WithdrawalStatus};
use crate::services::{ServiceError, WithdrawalServiceRequest};

pub async fn list_withdrawals(State(state): State<AppState>) -> ApiResponse {
    match dispatch(&state.withdrawal_channel, |response| {
        WithdrawalServiceRequest::ListWithdrawals { response }
    })
    .await
    {
        Ok(withdrawals) => (StatusCode::OK, Json(json!(withdrawals))),
        Err(e) => error_response(e),
    }
}

pub async fn process_withdrawal(
    State(state): State<AppState>,
    body: Result<Json<ProcessWithdrawal>, JsonRejection>,
) -> ApiResponse {
    let req = match json_body(body) {
        Ok(req) => req,
        Err(e) => return error_response(e),
    };
    let (Some(request_id), Some(status)) = (
        req.request_id.filter(|id| !id.is_empty()),
        req.status.filter(|status| !status.is_empty()),
    ) else {
        return error_response(ServiceError::InvalidInput(
            "Request ID and status are required".to_string(),
        ));
    };

    let status = match status.parse::<WithdrawalStatus>() {
        Ok(status) => status,
        Err(e) => return error_response(ServiceError::InvalidInput(e.to_string())),
    };

    match dispatch(&state.withdrawal_channel, |response| {
        WithdrawalServiceRequest::ProcessWithdrawal {
            request_id,
            status,
            response,
        }
    })
    .await
    {
        Ok(withdrawal) => (
            StatusCode::OK,
            Json(json!({
                "message": format!("Withdrawal request {} successfully", status),
                "withdrawal": withdrawal
            })),
        ),
        Err(e) => error_response(e),
    }
}
