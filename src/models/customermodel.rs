use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "customer_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CustomerSource {
    #[default]
    Direct,
    Referral,
    Import,
    Other,
}

impl CustomerSource {
    pub fn to_str(&self) -> &str {
        match self {
            CustomerSource::Direct => "direct",
            CustomerSource::Referral => "referral",
            CustomerSource::Import => "import",
            CustomerSource::Other => "other",
        }
    }
}

/// Per-customer referral counters. Written only by the referral ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStats {
    pub total_referrals: i64,
    pub successful_referrals: i64,
    pub pending_referrals: i64,
    pub total_rewards_earned: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPreferences {
    pub email_notifications: bool,
    pub sms_notifications: bool,
}

impl Default for CustomerPreferences {
    fn default() -> Self {
        CustomerPreferences {
            email_notifications: true,
            sms_notifications: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub business_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: CustomerSource,
    pub referred_by: Option<Uuid>,
    pub referral_campaign: Option<Uuid>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    #[sqlx(flatten)]
    pub referral_stats: ReferralStats,
    #[sqlx(flatten)]
    pub preferences: CustomerPreferences,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn is_referral(&self) -> bool {
        self.source == CustomerSource::Referral
    }

    pub fn email_matches(&self, email: &str) -> bool {
        self.email
            .as_deref()
            .map(|own| own.eq_ignore_ascii_case(email.trim()))
            .unwrap_or(false)
    }
}

/// A customer row that has not been written yet. The ledger builds these when
/// a referee converts; handlers build them for direct sign-ups and imports.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerDraft {
    pub id: Uuid,
    pub business_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: CustomerSource,
    pub referred_by: Option<Uuid>,
    pub referral_campaign: Option<Uuid>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub preferences: CustomerPreferences,
    pub created_at: DateTime<Utc>,
}

impl CustomerDraft {
    pub fn into_customer(self) -> Customer {
        Customer {
            id: self.id,
            business_id: self.business_id,
            user_id: self.user_id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            source: self.source,
            referred_by: self.referred_by,
            referral_campaign: self.referral_campaign,
            tags: self.tags,
            notes: self.notes,
            referral_stats: ReferralStats::default(),
            preferences: self.preferences,
            active: true,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}
