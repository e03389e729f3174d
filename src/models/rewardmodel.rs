use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use super::campaignmodel::RewardKind;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "reward_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RewardStatus {
    Pending,
    Issued,
    Claimed,
    Expired,
    Cancelled,
}

impl RewardStatus {
    pub fn to_str(&self) -> &str {
        match self {
            RewardStatus::Pending => "pending",
            RewardStatus::Issued => "issued",
            RewardStatus::Claimed => "claimed",
            RewardStatus::Expired => "expired",
            RewardStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: RewardStatus) -> bool {
        use RewardStatus::*;
        matches!(
            (self, next),
            (Pending, Issued)
                | (Pending, Cancelled)
                | (Issued, Claimed)
                | (Issued, Expired)
                | (Issued, Cancelled)
        )
    }
}

impl std::fmt::Display for RewardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

impl std::str::FromStr for RewardStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RewardStatus::Pending),
            "issued" => Ok(RewardStatus::Issued),
            "claimed" => Ok(RewardStatus::Claimed),
            "expired" => Ok(RewardStatus::Expired),
            "cancelled" => Ok(RewardStatus::Cancelled),
            other => Err(format!("Unknown reward status '{}'", other)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "recipient_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecipientType {
    Referrer,
    Referee,
}

impl RecipientType {
    pub fn to_str(&self) -> &str {
        match self {
            RecipientType::Referrer => "referrer",
            RecipientType::Referee => "referee",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "claim_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClaimMethod {
    #[default]
    Code,
    Link,
    Email,
    Manual,
    Automatic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClaimDetails {
    pub claimed_by: Option<String>,
    pub claim_location: Option<String>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Issued,
    Reminder,
    ExpiringSoon,
    Expired,
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issued" => Ok(NotificationKind::Issued),
            "reminder" => Ok(NotificationKind::Reminder),
            "expiring_soon" => Ok(NotificationKind::ExpiringSoon),
            "expired" => Ok(NotificationKind::Expired),
            other => Err(format!("Unknown notification type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub method: NotificationChannel,
    pub sent_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: Uuid,
    pub business_id: Uuid,
    pub campaign_id: Uuid,
    pub referral_id: Uuid,
    pub recipient_id: Uuid,
    pub recipient_type: RecipientType,
    #[serde(rename = "type")]
    pub reward_type: RewardKind,
    pub value: f64,
    pub description: Option<String>,
    pub code: String,
    pub status: RewardStatus,
    pub issued_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub claim_method: ClaimMethod,
    pub claim_details: Option<Json<ClaimDetails>>,
    pub notifications_sent: Json<Vec<NotificationRecord>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reward {
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// A reward about to be written alongside a referral transition.
#[derive(Debug, Clone)]
pub struct RewardDraft {
    pub id: Uuid,
    pub business_id: Uuid,
    pub campaign_id: Uuid,
    pub referral_id: Uuid,
    pub recipient_id: Uuid,
    pub recipient_type: RecipientType,
    pub reward_type: RewardKind,
    pub value: f64,
    pub description: Option<String>,
    pub code: String,
    pub status: RewardStatus,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RewardDraft {
    pub fn into_reward(self) -> Reward {
        Reward {
            id: self.id,
            business_id: self.business_id,
            campaign_id: self.campaign_id,
            referral_id: self.referral_id,
            recipient_id: self.recipient_id,
            recipient_type: self.recipient_type,
            reward_type: self.reward_type,
            value: self.value,
            description: self.description,
            code: self.code,
            status: self.status,
            issued_at: self.issued_at,
            claimed_at: None,
            expires_at: self.expires_at,
            claim_method: ClaimMethod::default(),
            claim_details: None,
            notifications_sent: Json(Vec::new()),
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_status_table() {
        assert!(RewardStatus::Pending.can_transition_to(RewardStatus::Issued));
        assert!(RewardStatus::Issued.can_transition_to(RewardStatus::Claimed));
        assert!(RewardStatus::Issued.can_transition_to(RewardStatus::Expired));
        assert!(!RewardStatus::Pending.can_transition_to(RewardStatus::Claimed));
        assert!(!RewardStatus::Claimed.can_transition_to(RewardStatus::Issued));
        assert!(!RewardStatus::Expired.can_transition_to(RewardStatus::Claimed));
        assert!(!RewardStatus::Issued.can_transition_to(RewardStatus::Issued));
    }

    #[test]
    fn notification_record_uses_type_key() {
        let record = NotificationRecord {
            kind: NotificationKind::ExpiringSoon,
            method: NotificationChannel::Email,
            sent_at: Utc::now(),
            status: DeliveryStatus::Sent,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "expiring_soon");
        assert_eq!(value["method"], "email");
    }
}
