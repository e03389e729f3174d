use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "analytics_period", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl AnalyticsPeriod {
    pub fn to_str(&self) -> &str {
        match self {
            AnalyticsPeriod::Daily => "daily",
            AnalyticsPeriod::Weekly => "weekly",
            AnalyticsPeriod::Monthly => "monthly",
            AnalyticsPeriod::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for AnalyticsPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(AnalyticsPeriod::Daily),
            "weekly" => Ok(AnalyticsPeriod::Weekly),
            "monthly" => Ok(AnalyticsPeriod::Monthly),
            "yearly" => Ok(AnalyticsPeriod::Yearly),
            other => Err(format!("Unknown analytics period '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralCounts {
    pub total: i64,
    pub pending: i64,
    pub clicked: i64,
    pub converted: i64,
    pub rewarded: i64,
    pub expired: i64,
    pub rejected: i64,
}

impl ReferralCounts {
    /// Converted or rewarded referrals as a percentage of all referrals.
    pub fn conversion_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.converted + self.rewarded) as f64 / self.total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignCounts {
    pub active: i64,
    pub ended: i64,
    pub total_referrals: i64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerCounts {
    pub total: i64,
    pub new: i64,
    pub active: i64,
    pub referred: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardCounts {
    pub total: i64,
    pub issued: i64,
    pub claimed: i64,
    pub expired: i64,
    pub total_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Financials {
    pub rewards_cost: f64,
}

/// Per sharing-method referral counts, keyed by method name.
pub type SharingCounts = BTreeMap<String, i64>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsFigures {
    pub referrals: ReferralCounts,
    pub campaigns: CampaignCounts,
    pub customers: CustomerCounts,
    pub rewards: RewardCounts,
    pub sharing: SharingCounts,
    pub financials: Financials,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub id: Uuid,
    pub business_id: Uuid,
    pub period: AnalyticsPeriod,
    pub snapshot_date: NaiveDate,
    pub referrals: Json<ReferralCounts>,
    pub campaigns: Json<CampaignCounts>,
    pub customers: Json<CustomerCounts>,
    pub rewards: Json<RewardCounts>,
    pub sharing: Json<SharingCounts>,
    pub financials: Json<Financials>,
    pub created_at: DateTime<Utc>,
}
