use std::fs;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;

use super::{
    already_processed, referral_not_found, user_not_found, withdrawal_not_found, AdminRepository,
    RepositoryError,
};
use crate::models::{
    referrals::Referral,
    users::User,
    withdrawals::{Withdrawal, WithdrawalStatus},
};
use crate::utils::commission;

#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub referrals: Vec<Referral>,
    #[serde(default)]
    pub withdrawals: Vec<Withdrawal>,
}

/// In-process store. Referrals are keyed by their owner's user id.
///
/// Entry locks are always taken withdrawals first, then referrals.
#[derive(Default)]
pub struct MemoryRepository {
    users: DashMap<String, User>,
    referrals: DashMap<String, Referral>,
    withdrawals: DashMap<String, Withdrawal>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: Seed) -> Self {
        let repository = Self::new();
        for user in seed.users {
            repository.insert_user(user);
        }
        for referral in seed.referrals {
            repository.insert_referral(referral);
        }
        for withdrawal in seed.withdrawals {
            repository.insert_withdrawal(withdrawal);
        }
        repository
    }

    pub fn from_seed_file(path: &str) -> Result<Self, RepositoryError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| RepositoryError::Seed(format!("{}: {}", path, e)))?;
        let seed: Seed = serde_json::from_str(&raw)
            .map_err(|e| RepositoryError::Seed(format!("{}: {}", path, e)))?;

        log::info!(
            "Loaded seed {}: {} users, {} referrals, {} withdrawals.",
            path,
            seed.users.len(),
            seed.referrals.len(),
            seed.withdrawals.len()
        );
        Ok(Self::from_seed(seed))
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn insert_referral(&self, referral: Referral) {
        self.referrals.insert(referral.user_id.clone(), referral);
    }

    pub fn insert_withdrawal(&self, withdrawal: Withdrawal) {
        self.withdrawals.insert(withdrawal.id.clone(), withdrawal);
    }
}

#[async_trait]
impl AdminRepository for MemoryRepository {
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let mut users: Vec<User> = self.users.iter().map(|entry| entry.value().clone()).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.get(id).map(|entry| entry.value().clone()))
    }

    async fn set_user_approved(&self, id: &str, approved: bool) -> Result<User, RepositoryError> {
        let mut user = self.users.get_mut(id).ok_or_else(user_not_found)?;
        user.approved = approved;
        user.updated_at = Utc::now();
        Ok(user.value().clone())
    }

    async fn delete_user(&self, id: &str) -> Result<User, RepositoryError> {
        self.users
            .remove(id)
            .map(|(_, user)| user)
            .ok_or_else(user_not_found)
    }

    async fn delete_unverified_users(&self) -> Result<u64, RepositoryError> {
        let mut deleted = 0u64;
        self.users.retain(|_, user| {
            if !user.verified {
                deleted += 1;
            }
            user.verified
        });
        Ok(deleted)
    }

    async fn get_referral_by_user(
        &self,
        user_id: &str,
    ) -> Result<Option<Referral>, RepositoryError> {
        Ok(self.referrals.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn list_withdrawals(&self) -> Result<Vec<Withdrawal>, RepositoryError> {
        let mut withdrawals: Vec<Withdrawal> = self
            .withdrawals
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        withdrawals.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(withdrawals)
    }

    async fn approve_withdrawal(
        &self,
        id: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, RepositoryError> {
        let mut withdrawal = self.withdrawals.get_mut(id).ok_or_else(withdrawal_not_found)?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(already_processed(id, withdrawal.status));
        }

        let mut referral = self
            .referrals
            .get_mut(&withdrawal.user_id)
            .ok_or_else(referral_not_found)?;
        let updated = commission::deduct(&referral.commission, withdrawal.amount)?;

        referral.commission = updated;
        referral.updated_at = processed_at;
        withdrawal.status = WithdrawalStatus::Approved;
        withdrawal.processed_at = Some(processed_at);

        Ok(withdrawal.value().clone())
    }

    async fn set_withdrawal_status(
        &self,
        id: &str,
        status: WithdrawalStatus,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, RepositoryError> {
        let mut withdrawal = self.withdrawals.get_mut(id).ok_or_else(withdrawal_not_found)?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(already_processed(id, withdrawal.status));
        }

        withdrawal.status = status;
        withdrawal.processed_at = Some(processed_at);
        Ok(withdrawal.value().clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::referrals::Commission;
    use crate::utils::commission::LedgerError;
    use chrono::TimeZone;

    pub(crate) fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    pub(crate) fn user(id: &str, verified: bool) -> User {
        User {
            id: id.to_string(),
            name: format!("User {}", id),
            email: format!("{}@example.com", id),
            verified,
            approved: false,
            referred_by: None,
            created_at: at(1),
            updated_at: at(1),
        }
    }

    pub(crate) fn referral(user_id: &str, commission: Commission) -> Referral {
        Referral {
            id: format!("ref-{}", user_id),
            user_id: user_id.to_string(),
            referral_code: format!("CODE-{}", user_id),
            commission,
            created_at: at(1),
            updated_at: at(1),
        }
    }

    pub(crate) fn withdrawal(id: &str, user_id: &str, amount: u64, hour: u32) -> Withdrawal {
        Withdrawal {
            id: id.to_string(),
            user_id: user_id.to_string(),
            amount,
            status: WithdrawalStatus::Pending,
            requested_at: at(hour),
            processed_at: None,
        }
    }

    fn seeded() -> MemoryRepository {
        MemoryRepository::from_seed(Seed {
            users: vec![user("alice", true), user("bob", false)],
            referrals: vec![referral("alice", Commission::new(3000, 300, 150))],
            withdrawals: vec![
                withdrawal("w1", "alice", 345, 2),
                withdrawal("w2", "alice", 10_000, 3),
                withdrawal("w3", "bob", 10, 4),
            ],
        })
    }

    #[tokio::test]
    async fn approval_deducts_and_stamps_withdrawal() {
        let repository = seeded();

        let withdrawal = repository.approve_withdrawal("w1", at(5)).await.unwrap();
        assert_eq!(withdrawal.status, WithdrawalStatus::Approved);
        assert_eq!(withdrawal.processed_at, Some(at(5)));

        let referral = repository.get_referral_by_user("alice").await.unwrap().unwrap();
        assert_eq!(referral.commission, Commission::new(2700, 270, 135));
    }

    #[tokio::test]
    async fn insufficient_balance_leaves_everything_untouched() {
        let repository = seeded();

        let err = repository.approve_withdrawal("w2", at(5)).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Ledger(LedgerError::InsufficientBalance { .. })
        ));

        let withdrawals = repository.list_withdrawals().await.unwrap();
        let w2 = withdrawals.iter().find(|w| w.id == "w2").unwrap();
        assert_eq!(w2.status, WithdrawalStatus::Pending);
        assert_eq!(w2.processed_at, None);

        let referral = repository.get_referral_by_user("alice").await.unwrap().unwrap();
        assert_eq!(referral.commission, Commission::new(3000, 300, 150));
    }

    #[tokio::test]
    async fn missing_referral_record_is_not_found() {
        let repository = seeded();
        let err = repository.approve_withdrawal("w3", at(5)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn processed_withdrawal_cannot_transition_again() {
        let repository = seeded();
        repository
            .set_withdrawal_status("w1", WithdrawalStatus::Declined, at(5))
            .await
            .unwrap();

        let err = repository.approve_withdrawal("w1", at(6)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let referral = repository.get_referral_by_user("alice").await.unwrap().unwrap();
        assert_eq!(referral.commission, Commission::new(3000, 300, 150));
    }

    #[tokio::test]
    async fn withdrawals_are_listed_newest_first() {
        let repository = seeded();
        let ids: Vec<String> = repository
            .list_withdrawals()
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(ids, vec!["w3", "w2", "w1"]);
    }

    #[tokio::test]
    async fn deleting_unverified_users_keeps_verified_ones() {
        let repository = seeded();
        assert_eq!(repository.delete_unverified_users().await.unwrap(), 1);

        let users = repository.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "alice");
    }

    #[tokio::test]
    async fn deleting_user_keeps_referral_record() {
        let repository = seeded();
        let deleted = repository.delete_user("alice").await.unwrap();
        assert_eq!(deleted.id, "alice");
        assert!(repository.get_user("alice").await.unwrap().is_none());
        assert!(repository.get_referral_by_user("alice").await.unwrap().is_some());

        let err = repository.delete_user("alice").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[test]
    fn seed_parses_from_json() {
        let raw = r#"{
            "users": [{
                "id": "u1", "name": "U", "email": "u@example.com",
                "verified": true, "approved": false, "referredBy": null,
                "createdAt": "2025-03-01T00:00:00Z", "updatedAt": "2025-03-01T00:00:00Z"
            }],
            "referrals": [{
                "id": "r1", "userId": "u1", "referralCode": "ABC",
                "commission": {"level1": 3000},
                "createdAt": "2025-03-01T00:00:00Z", "updatedAt": "2025-03-01T00:00:00Z"
            }]
        }"#;
        let seed: Seed = serde_json::from_str(raw).unwrap();
        assert_eq!(seed.users.len(), 1);
        assert_eq!(seed.referrals[0].commission.level2, None);
        assert!(seed.withdrawals.is_empty());
    }
}
