use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::{referrals::ReferralDetails, users::User};
use crate::repositories::AdminRepository;
use crate::utils::commission::{self, CommissionRates};

pub enum UserRequest {
    ListUsers {
        response: oneshot::Sender<Result<Vec<User>, ServiceError>>,
    },
    SetApproval {
        id: String,
        approved: bool,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    GetReferralDetails {
        id: String,
        response: oneshot::Sender<Result<ReferralDetails, ServiceError>>,
    },
    DeleteUser {
        id: String,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    DeleteUnverifiedUsers {
        response: oneshot::Sender<Result<u64, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: Arc<dyn AdminRepository>,
    rates: CommissionRates,
}

impl UserRequestHandler {
    pub fn new(repository: Arc<dyn AdminRepository>, rates: CommissionRates) -> Self {
        UserRequestHandler { repository, rates }
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        self.repository
            .list_users()
            .await
            .map_err(|e| ServiceError::from_repository("UserService", e))
    }

    async fn set_approval(&self, id: &str, approved: bool) -> Result<User, ServiceError> {
        let user = self
            .repository
            .set_user_approved(id, approved)
            .await
            .map_err(|e| ServiceError::from_repository("UserService", e))?;

        log::info!("User {} approval set to {}.", user.id, user.approved);
        Ok(user)
    }

    async fn get_referral_details(&self, id: &str) -> Result<ReferralDetails, ServiceError> {
        let user = self
            .repository
            .get_user(id)
            .await
            .map_err(|e| ServiceError::from_repository("UserService", e))?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let referral = self
            .repository
            .get_referral_by_user(id)
            .await
            .map_err(|e| ServiceError::from_repository("UserService", e))?;

        Ok(ReferralDetails {
            user,
            referral_details: referral
                .map(|referral| commission::summarize(&referral.commission, &self.rates)),
        })
    }

    async fn delete_user(&self, id: &str) -> Result<User, ServiceError> {
        let user = self
            .repository
            .delete_user(id)
            .await
            .map_err(|e| ServiceError::from_repository("UserService", e))?;

        log::info!("Deleted user {}.", user.id);
        Ok(user)
    }

    async fn delete_unverified_users(&self) -> Result<u64, ServiceError> {
        let deleted = self
            .repository
            .delete_unverified_users()
            .await
            .map_err(|e| ServiceError::from_repository("UserService", e))?;

        log::info!("Deleted {} unverified users.", deleted);
        Ok(deleted)
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::ListUsers { response } => {
                let users = self.list_users().await;
                let _ = response.send(users);
            }
            UserRequest::SetApproval {
                id,
                approved,
                response,
            } => {
                let user = self.set_approval(&id, approved).await;
                let _ = response.send(user);
            }
            UserRequest::GetReferralDetails { id, response } => {
                let details = self.get_referral_details(&id).await;
                let _ = response.send(details);
            }
            UserRequest::DeleteUser { id, response } => {
                let user = self.delete_user(&id).await;
                let _ = response.send(user);
            }
            UserRequest::DeleteUnverifiedUsers { response } => {
                let deleted = self.delete_unverified_users().await;
                let _ = response.send(deleted);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
