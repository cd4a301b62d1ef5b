use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::repositories::{AdminRepository, RepositoryError};
use crate::utils::commission::{CommissionRates, LedgerError};

pub mod http;
mod users;
mod withdrawals;

pub use users::UserRequest;
pub use withdrawals::WithdrawalServiceRequest;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InsufficientBalance(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

impl ServiceError {
    fn from_repository(service: &str, error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(message) => ServiceError::NotFound(message),
            RepositoryError::Conflict(message) => ServiceError::Conflict(message),
            RepositoryError::Ledger(e @ LedgerError::InsufficientBalance { .. }) => {
                ServiceError::InsufficientBalance(e.to_string())
            }
            other => ServiceError::Repository(service.to_string(), other.to_string()),
        }
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

#[derive(Clone)]
pub struct ServiceChannels {
    pub users: mpsc::Sender<UserRequest>,
    pub withdrawals: mpsc::Sender<WithdrawalServiceRequest>,
}

pub fn start_services(
    repository: Arc<dyn AdminRepository>,
    rates: CommissionRates,
) -> ServiceChannels {
    let (user_tx, mut user_rx) = mpsc::channel(512);
    let (withdrawal_tx, mut withdrawal_rx) = mpsc::channel(512);

    let mut user_service = users::UserService::new();
    let mut withdrawal_service = withdrawals::WithdrawalService::new();

    log::info!("Starting user service.");
    let user_repository = repository.clone();
    tokio::spawn(async move {
        user_service
            .run(
                users::UserRequestHandler::new(user_repository, rates),
                &mut user_rx,
            )
            .await;
    });

    log::info!("Starting withdrawal service.");
    tokio::spawn(async move {
        withdrawal_service
            .run(
                withdrawals::WithdrawalRequestHandler::new(repository),
                &mut withdrawal_rx,
            )
            .await;
    });

    ServiceChannels {
        users: user_tx,
        withdrawals: withdrawal_tx,
    }
}
