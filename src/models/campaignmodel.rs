use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rewardmodel::RecipientType;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "campaign_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    #[default]
    Active,
    Paused,
    Ended,
    Cancelled,
}

impl CampaignStatus {
    pub fn to_str(&self) -> &str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Ended => "ended",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, Active)
                | (Draft, Cancelled)
                | (Active, Paused)
                | (Active, Ended)
                | (Active, Cancelled)
                | (Paused, Active)
                | (Paused, Ended)
                | (Paused, Cancelled)
        )
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "active" => Ok(CampaignStatus::Active),
            "paused" => Ok(CampaignStatus::Paused),
            "ended" => Ok(CampaignStatus::Ended),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            other => Err(format!("Unknown campaign status '{}'", other)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "reward_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Percentage,
    #[default]
    Fixed,
    Points,
    Custom,
}

impl RewardKind {
    pub fn to_str(&self) -> &str {
        match self {
            RewardKind::Percentage => "percentage",
            RewardKind::Fixed => "fixed",
            RewardKind::Points => "points",
            RewardKind::Custom => "custom",
        }
    }

    /// Leading letter of reward codes, e.g. `F7K2M9QXA` for a fixed reward.
    pub fn initial(&self) -> char {
        match self {
            RewardKind::Percentage | RewardKind::Points => 'P',
            RewardKind::Fixed => 'F',
            RewardKind::Custom => 'C',
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "conversion_criteria", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversionCriteria {
    Purchase,
    Signup,
    Subscription,
    Custom,
    #[default]
    Form,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRule {
    #[serde(rename = "type")]
    pub kind: RewardKind,
    pub value: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatistics {
    pub total_referrals: i64,
    pub successful_referrals: i64,
    pub pending_referrals: i64,
    pub clicked_referrals: i64,
    pub total_rewards: i64,
    pub total_rewards_value: f64,
}

impl CampaignStatistics {
    pub fn conversion_rate(&self) -> f64 {
        if self.total_referrals == 0 {
            return 0.0;
        }
        self.successful_referrals as f64 / self.total_referrals as f64 * 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub referrer_reward: RewardRule,
    pub referee_reward: RewardRule,
    pub status: CampaignStatus,
    pub active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub referral_expiration_days: Option<i32>,
    pub conversion_criteria: ConversionCriteria,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
    pub statistics: CampaignStatistics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn accepts_referrals(&self, now: DateTime<Utc>) -> bool {
        self.status == CampaignStatus::Active
            && self.active
            && self.start_date <= now
            && self.end_date.map_or(true, |end| end >= now)
    }

    pub fn reward_rule(&self, recipient: RecipientType) -> &RewardRule {
        match recipient {
            RecipientType::Referrer => &self.referrer_reward,
            RecipientType::Referee => &self.referee_reward,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignRow {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub referrer_reward_type: RewardKind,
    pub referrer_reward_value: f64,
    pub referrer_reward_description: Option<String>,
    pub referee_reward_type: RewardKind,
    pub referee_reward_value: f64,
    pub referee_reward_description: Option<String>,
    pub status: CampaignStatus,
    pub active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub referral_expiration_days: Option<i32>,
    pub conversion_criteria: ConversionCriteria,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
    #[sqlx(flatten)]
    pub statistics: CampaignStatistics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CampaignRow> for Campaign {
    fn from(row: CampaignRow) -> Self {
        Campaign {
            id: row.id,
            business_id: row.business_id,
            name: row.name,
            description: row.description,
            referrer_reward: RewardRule {
                kind: row.referrer_reward_type,
                value: row.referrer_reward_value,
                description: row.referrer_reward_description,
            },
            referee_reward: RewardRule {
                kind: row.referee_reward_type,
                value: row.referee_reward_value,
                description: row.referee_reward_description,
            },
            status: row.status,
            active: row.active,
            start_date: row.start_date,
            end_date: row.end_date,
            referral_expiration_days: row.referral_expiration_days,
            conversion_criteria: row.conversion_criteria,
            email_subject: row.email_subject,
            email_body: row.email_body,
            statistics: row.statistics,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_status_table() {
        assert!(CampaignStatus::Draft.can_transition_to(CampaignStatus::Active));
        assert!(CampaignStatus::Paused.can_transition_to(CampaignStatus::Active));
        assert!(!CampaignStatus::Ended.can_transition_to(CampaignStatus::Active));
        assert!(!CampaignStatus::Active.can_transition_to(CampaignStatus::Active));
        assert!(!CampaignStatus::Cancelled.can_transition_to(CampaignStatus::Draft));
    }

    #[test]
    fn reward_code_initials() {
        assert_eq!(RewardKind::Fixed.initial(), 'F');
        assert_eq!(RewardKind::Percentage.initial(), 'P');
        assert_eq!(RewardKind::Custom.initial(), 'C');
    }
}
