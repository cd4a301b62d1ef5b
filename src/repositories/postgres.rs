use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::{
    already_processed, referral_not_found, user_not_found, withdrawal_not_found, AdminRepository,
    RepositoryError,
};
use crate::models::{
    referrals::{Commission, Referral},
    users::User,
    withdrawals::{Withdrawal, WithdrawalStatus},
};
use crate::utils::commission;

const USER_COLUMNS: &str = "id, name, email, verified, approved, referred_by, created_at, updated_at";
const REFERRAL_COLUMNS: &str = "id, user_id, referral_code, level1_commission, level2_commission, level3_commission, created_at, updated_at";
const WITHDRAWAL_COLUMNS: &str = "id, user_id, amount, status, requested_at, processed_at";

#[derive(sqlx::FromRow)]
struct ReferralRow {
    id: String,
    user_id: String,
    referral_code: String,
    level1_commission: Option<i64>,
    level2_commission: Option<i64>,
    level3_commission: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReferralRow> for Referral {
    type Error = RepositoryError;

    fn try_from(row: ReferralRow) -> Result<Self, Self::Error> {
        let level = |value: Option<i64>| value.map(|v| from_db_amount(&row.id, v)).transpose();
        let commission = Commission {
            level1: level(row.level1_commission)?,
            level2: level(row.level2_commission)?,
            level3: level(row.level3_commission)?,
        };

        Ok(Referral {
            commission,
            id: row.id,
            user_id: row.user_id,
            referral_code: row.referral_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WithdrawalRow {
    id: String,
    user_id: String,
    amount: i64,
    status: String,
    requested_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<WithdrawalRow> for Withdrawal {
    type Error = RepositoryError;

    fn try_from(row: WithdrawalRow) -> Result<Self, Self::Error> {
        let amount = from_db_amount(&row.id, row.amount)?;
        let status = row
            .status
            .parse::<WithdrawalStatus>()
            .map_err(|e| RepositoryError::InvalidRecord(format!("{}: {}", row.id, e)))?;

        Ok(Withdrawal {
            id: row.id,
            user_id: row.user_id,
            amount,
            status,
            requested_at: row.requested_at,
            processed_at: row.processed_at,
        })
    }
}

fn from_db_amount(record_id: &str, value: i64) -> Result<u64, RepositoryError> {
    u64::try_from(value).map_err(|_| {
        RepositoryError::InvalidRecord(format!("{}: negative amount {}", record_id, value))
    })
}

fn to_db_amount(record_id: &str, value: u64) -> Result<i64, RepositoryError> {
    i64::try_from(value).map_err(|_| {
        RepositoryError::InvalidRecord(format!("{}: amount {} out of range", record_id, value))
    })
}

#[derive(Clone)]
pub struct PgRepository {
    conn: PgPool,
}

impl PgRepository {
    pub fn new(conn: PgPool) -> Self {
        PgRepository { conn }
    }

    pub async fn migrate(&self) -> Result<(), anyhow::Error> {
        sqlx::migrate!("./migrations").run(&self.conn).await?;
        Ok(())
    }

    async fn lock_pending_withdrawal(
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
    ) -> Result<Withdrawal, RepositoryError> {
        let row = sqlx::query_as::<_, WithdrawalRow>(&format!(
            "SELECT {} FROM withdrawals WHERE id = $1 FOR UPDATE",
            WITHDRAWAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(withdrawal_not_found)?;

        let withdrawal = Withdrawal::try_from(row)?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(already_processed(id, withdrawal.status));
        }

        Ok(withdrawal)
    }

    async fn finish_withdrawal(
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
        status: WithdrawalStatus,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, RepositoryError> {
        let row = sqlx::query_as::<_, WithdrawalRow>(&format!(
            "UPDATE withdrawals SET status = $1, processed_at = $2 WHERE id = $3 RETURNING {}",
            WITHDRAWAL_COLUMNS
        ))
        .bind(status.as_str())
        .bind(processed_at)
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;

        Withdrawal::try_from(row)
    }
}

#[async_trait]
impl AdminRepository for PgRepository {
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY created_at",
            USER_COLUMNS
        ))
        .fetch_all(&self.conn)
        .await?;

        Ok(users)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    async fn set_user_approved(&self, id: &str, approved: bool) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET approved = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(approved)
        .bind(id)
        .fetch_optional(&self.conn)
        .await?
        .ok_or_else(user_not_found)
    }

    async fn delete_user(&self, id: &str) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.conn)
        .await?
        .ok_or_else(user_not_found)
    }

    async fn delete_unverified_users(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE verified = false")
            .execute(&self.conn)
            .await?;

        Ok(result.rows_affected())
    }

    async fn get_referral_by_user(
        &self,
        user_id: &str,
    ) -> Result<Option<Referral>, RepositoryError> {
        let row = sqlx::query_as::<_, ReferralRow>(&format!(
            "SELECT {} FROM referrals WHERE user_id = $1",
            REFERRAL_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        row.map(Referral::try_from).transpose()
    }

    async fn list_withdrawals(&self) -> Result<Vec<Withdrawal>, RepositoryError> {
        let rows = sqlx::query_as::<_, WithdrawalRow>(&format!(
            "SELECT {} FROM withdrawals ORDER BY requested_at DESC",
            WITHDRAWAL_COLUMNS
        ))
        .fetch_all(&self.conn)
        .await?;

        rows.into_iter().map(Withdrawal::try_from).collect()
    }

    async fn approve_withdrawal(
        &self,
        id: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, RepositoryError> {
        // Dropping the transaction on any early return rolls it back.
        let mut tx = self.conn.begin().await?;
        let withdrawal = Self::lock_pending_withdrawal(&mut tx, id).await?;

        let row = sqlx::query_as::<_, ReferralRow>(&format!(
            "SELECT {} FROM referrals WHERE user_id = $1 FOR UPDATE",
            REFERRAL_COLUMNS
        ))
        .bind(&withdrawal.user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(referral_not_found)?;
        let referral = Referral::try_from(row)?;

        let updated = commission::deduct(&referral.commission, withdrawal.amount)?;
        let [level1, level2, level3] = updated.levels();

        sqlx::query(
            r#"
            UPDATE referrals
            SET level1_commission = $1, level2_commission = $2, level3_commission = $3,
                updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(to_db_amount(&referral.id, level1)?)
        .bind(to_db_amount(&referral.id, level2)?)
        .bind(to_db_amount(&referral.id, level3)?)
        .bind(processed_at)
        .bind(&referral.id)
        .execute(&mut *tx)
        .await?;

        let withdrawal =
            Self::finish_withdrawal(&mut tx, id, WithdrawalStatus::Approved, processed_at).await?;
        tx.commit().await?;

        Ok(withdrawal)
    }

    async fn set_withdrawal_status(
        &self,
        id: &str,
        status: WithdrawalStatus,
        processed_at: DateTime<Utc>,
    ) -> Result<Withdrawal, RepositoryError> {
        let mut tx = self.conn.begin().await?;
        Self::lock_pending_withdrawal(&mut tx, id).await?;
        let withdrawal = Self::finish_withdrawal(&mut tx, id, status, processed_at).await?;
        tx.commit().await?;

        Ok(withdrawal)
    }
}
