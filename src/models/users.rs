use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub verified: bool,
    pub approved: bool,
    pub referred_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApproveUser {
    pub id: Option<String>,
    pub approved: Option<bool>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DeleteUser {
    pub id: Option<String>,
}
