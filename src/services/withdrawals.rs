use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::withdrawals::{Withdrawal, WithdrawalStatus};
use crate::repositories::AdminRepository;

pub enum WithdrawalServiceRequest {
    ListWithdrawals {
        response: oneshot::Sender<Result<Vec<Withdrawal>, ServiceError>>,
    },
    ProcessWithdrawal {
        request_id: String,
        status: WithdrawalStatus,
        response: oneshot::Sender<Result<Withdrawal, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct WithdrawalRequestHandler {
    repository: Arc<dyn AdminRepository>,
}

impl WithdrawalRequestHandler {
    pub fn new(repository: Arc<dyn AdminRepository>) -> Self {
        WithdrawalRequestHandler { repository }
    }

    async fn list_withdrawals(&self) -> Result<Vec<Withdrawal>, ServiceError> {
        self.repository
            .list_withdrawals()
            .await
            .map_err(|e| ServiceError::from_repository("WithdrawalService", e))
    }

    async fn process_withdrawal(
        &self,
        request_id: &str,
        status: WithdrawalStatus,
    ) -> Result<Withdrawal, ServiceError> {
        let processed_at = Utc::now();

        let result = match status {
            WithdrawalStatus::Pending => {
                return Err(ServiceError::InvalidInput(
                    "A withdrawal request can only be Approved or Declined".to_string(),
                ))
            }
            WithdrawalStatus::Approved => {
                self.repository
                    .approve_withdrawal(request_id, processed_at)
                    .await
            }
            status => {
                self.repository
                    .set_withdrawal_status(request_id, status, processed_at)
                    .await
            }
        };

        match result {
            Ok(withdrawal) => {
                log::info!(
                    "Withdrawal {} of {} for user {} {}.",
                    withdrawal.id,
                    withdrawal.amount,
                    withdrawal.user_id,
                    withdrawal.status
                );
                Ok(withdrawal)
            }
            Err(e) => {
                log::warn!("Could not mark withdrawal {} {}: {}", request_id, status, e);
                Err(ServiceError::from_repository("WithdrawalService", e))
            }
        }
    }
}

#[async_trait]
impl RequestHandler<WithdrawalServiceRequest> for WithdrawalRequestHandler {
    async fn handle_request(&self, request: WithdrawalServiceRequest) {
        match request {
            WithdrawalServiceRequest::ListWithdrawals { response } => {
                let withdrawals = self.list_withdrawals().await;
                let _ = response.send(withdrawals);
            }
            WithdrawalServiceRequest::ProcessWithdrawal {
                request_id,
                status,
                response,
            } => {
                let withdrawal = self.process_withdrawal(&request_id, status).await;
                let _ = response.send(withdrawal);
            }
        }
    }
}

pub struct WithdrawalService;

impl WithdrawalService {
    pub fn new() -> Self {
        WithdrawalService {}
    }
}

#[async_trait]
impl Service<WithdrawalServiceRequest, WithdrawalRequestHandler> for WithdrawalService {}
