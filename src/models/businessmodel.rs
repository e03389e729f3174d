use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_REFERRAL_EXPIRATION_DAYS: i32 = 30;
pub const DEFAULT_REWARD_AMOUNT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BusinessSettings {
    pub email_notifications: bool,
    pub sms_notifications: bool,
    pub default_reward_amount: f64,
    pub default_referral_expiration_days: i32,
}

impl Default for BusinessSettings {
    fn default() -> Self {
        BusinessSettings {
            email_notifications: true,
            sms_notifications: false,
            default_reward_amount: DEFAULT_REWARD_AMOUNT,
            default_referral_expiration_days: DEFAULT_REFERRAL_EXPIRATION_DAYS,
        }
    }
}

/// Tenant root. Every campaign, customer, referral and reward hangs off one.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_name: String,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    #[sqlx(flatten)]
    pub settings: BusinessSettings,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Business {
    pub fn referral_expiration_days(&self) -> i64 {
        let days = self.settings.default_referral_expiration_days;
        if days > 0 {
            days as i64
        } else {
            DEFAULT_REFERRAL_EXPIRATION_DAYS as i64
        }
    }
}
