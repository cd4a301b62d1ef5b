use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::{ServiceChannels, ServiceError, UserRequest, WithdrawalServiceRequest};

mod users;
mod withdrawals;


#[derive(Clone)]
pub struct AppState {
    user_channel: mpsc::Sender<UserRequest>,
    withdrawal_channel: mpsc::Sender<WithdrawalServiceRequest>,
}

type ApiResponse = (StatusCode, Json<Value>);

/// Sends a request to a service and waits for its reply.
async fn dispatch<R, T>(
    channel: &mpsc::Sender<R>,
    request: impl FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
) -> Result<T, ServiceError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(request(response_tx))
        .await
        .map_err(|e| ServiceError::Communication("Http".to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication("Http".to_string(), e.to_string()))?
}

/// Unwraps a JSON body, turning a malformed one into an input error.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ServiceError::InvalidInput(rejection.body_text()))
}

fn error_response(error: ServiceError) -> ApiResponse {
    let status = match &error {
        ServiceError::InvalidInput(_) | ServiceError::InsufficientBalance(_) => {
            StatusCode::BAD_REQUEST
        }
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Repository(_, _) | ServiceError::Communication(_, _) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status.is_server_error() {
        log::error!("Request failed: {}", error);
        (status, Json(json!({ "message": "Internal server error" })))
    } else {
        log::warn!("Request rejected: {}", error);
        (status, Json(json!({ "message": error.to_string() })))
    }
}

pub fn build_router(channels: ServiceChannels) -> Router {
    let app_state = AppState {
        user_channel: channels.users,
        withdrawal_channel: channels.withdrawals,
    };

    Router::new()
        .route(
            "/admin/users",
            get(users::list_users).delete(users::delete_user),
        )
        .route("/admin/users/approve", put(users::approve_user))
        .route(
            "/admin/users/unverified",
            delete(users::delete_unverified_users),
        )
        .route(
            "/admin/users/{user_id}/referrals",
            get(users::get_referral_details),
        )
        .route("/admin/withdrawals", get(withdrawals::list_withdrawals))
        .route(
            "/admin/withdrawals/approve",
            put(withdrawals::process_withdrawal),
        )
        .route("/health", get(|| async { "OK" }))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    listen: &str,
    channels: ServiceChannels,
) -> Result<(), anyhow::Error> {
    let app = build_router(channels);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
