use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    referrals::Referral,
    users::User,
    withdrawals::{Withdrawal, WithdrawalStatus},
};
use crate::utils::commission::LedgerError;

pub mod memory;
pub mod postgres;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Seed error: {0}")]
    Seed(String),
}

/// Storage behind the admin services.
///
/// Implementations must serialize concurrent updates of the same withdrawal
/// and referral record: `approve_withdrawal` reads the balance and writes the
/// deducted commission as one exclusive unit.
#[async_trait]
pub trait AdminRepository: Send + Sync + 'static {
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;

    async fn get_user(&self, id: &str) -> Result<Option<User>, RepositoryError>;

    async fn set_user_approved(&self, id: &str, approved: bool) -> Result<User, RepositoryError>;

    async fn delete_user(&self, id: &str) -> Result<User, RepositoryError>;

    async fn delete_unverified_users(&self) -> Result<u64, RepositoryError>;

    async fn get_referral_by_user(&self, user_id: &str)
        -> Result<Option<Referral>, RepositoryError>;

    async fn list_withdrawals(&self) -> Result<Vec<Withdrawal>, RepositoryError>;

    /// Marks a pending withdrawal approved and deducts its amount from the
    /// owner's commission. Nothing is written unless both updates succeed.
    async fn approve_withdrawal(
        &self,
        id: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, RepositoryError>;

    /// Moves a pending withdrawal to `status` without touching commission.
    async fn set_withdrawal_status(
        &self,
        id: &str,
        status: WithdrawalStatus,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, RepositoryError>;
}

fn user_not_found() -> RepositoryError {
    RepositoryError::NotFound("User not found".to_string())
}

fn withdrawal_not_found() -> RepositoryError {
    RepositoryError::NotFound("Withdrawal request not found".to_string())
}

fn referral_not_found() -> RepositoryError {
    RepositoryError::NotFound("Referral record not found for this user".to_string())
}

fn already_processed(withdrawal_id: &str, status: WithdrawalStatus) -> RepositoryError {
    RepositoryError::Conflict(format!(
        "Withdrawal request {} was already {}",
        withdrawal_id, status
    ))
}
