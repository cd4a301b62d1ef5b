use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;

use super::{dispatch, error_response, json_body, ApiResponse, AppState};
use crate::models::users::{ApproveUser, DeleteUser};
use crate::services::{ServiceError, UserRequest};

pub async fn list_users(State(state): State<AppState>) -> ApiResponse {
    match dispatch(&state.user_channel, |response| UserRequest::ListUsers {
        response,
    })
    .await
    {
        Ok(users) => (StatusCode::OK, Json(json!({ "users": users }))),
        Err(e) => error_response(e),
    }
}

pub async fn approve_user(
    State(state): State<AppState>,
    body: Result<Json<ApproveUser>, JsonRejection>,
) -> ApiResponse {
    let req = match json_body(body) {
        Ok(req) => req,
        Err(e) => return error_response(e),
    };
    let (Some(id), Some(approved)) = (req.id.filter(|id| !id.is_empty()), req.approved) else {
        return error_response(ServiceError::InvalidInput(
            "Both 'id' and 'approved' fields are required".to_string(),
        ));
    };

    match dispatch(&state.user_channel, |response| UserRequest::SetApproval {
        id,
        approved,
        response,
    })
    .await
    {
        Ok(user) => (
            StatusCode::OK,
            Json(json!({
                "message": "User approval status updated successfully",
                "updatedUser": user
            })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn get_referral_details(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResponse {
    match dispatch(&state.user_channel, |response| {
        UserRequest::GetReferralDetails {
            id: user_id,
            response,
        }
    })
    .await
    {
        Ok(details) => {
            let referral_details = match details.referral_details {
                Some(summary) => json!(summary),
                None => json!({}),
            };

            (
                StatusCode::OK,
                Json(json!({
                    "user": details.user,
                    "referralDetails": referral_details
                })),
            )
        }
        Err(e) => error_response(e),
    }
}

pub async fn delete_user(
    State(state): State<AppState>,
    body: Result<Json<DeleteUser>, JsonRejection>,
) -> ApiResponse {
    let req = match json_body(body) {
        Ok(req) => req,
        Err(e) => return error_response(e),
    };
    let Some(id) = req.id.filter(|id| !id.is_empty()) else {
        return error_response(ServiceError::InvalidInput("User ID is required".to_string()));
    };

    match dispatch(&state.user_channel, |response| UserRequest::DeleteUser {
        id,
        response,
    })
    .await
    {
        Ok(user) => (
            StatusCode::OK,
            Json(json!({
                "message": "User deleted successfully",
                "user": user
            })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn delete_unverified_users(State(state): State<AppState>) -> ApiResponse {
    match dispatch(&state.user_channel, |response| {
        UserRequest::DeleteUnverifiedUsers { response }
    })
    .await
    {
        Ok(deleted) => (StatusCode::OK, Json(json!({ "deletedCount": deleted }))),
        Err(e) => error_response(e),
    }
}
