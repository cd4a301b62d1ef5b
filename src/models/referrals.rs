use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::users::User;

/// Accumulated commission per referral tier. A missing level counts as zero.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Commission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level1: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level2: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level3: Option<u64>,
}

impl Commission {
    pub fn new(level1: u64, level2: u64, level3: u64) -> Self {
        Commission {
            level1: Some(level1),
            level2: Some(level2),
            level3: Some(level3),
        }
    }

    pub fn levels(&self) -> [u64; 3] {
        [
            self.level1.unwrap_or(0),
            self.level2.unwrap_or(0),
            self.level3.unwrap_or(0),
        ]
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub id: String,
    pub user_id: String,
    pub referral_code: String,
    #[serde(default)]
    pub commission: Commission,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSummary {
    pub total_commission: u64,
    pub commission_breakdown: Commission,
    pub level1_referrals: u64,
    pub level2_referrals: u64,
    pub level3_referrals: u64,
    pub total_referrals: u64,
}

#[derive(Clone, Debug)]
pub struct ReferralDetails {
    pub user: User,
    pub referral_details: Option<ReferralSummary>,
}
