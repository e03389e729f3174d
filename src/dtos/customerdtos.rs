use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::CustomerChanges,
    models::customermodel::{Customer, CustomerDraft, CustomerPreferences, CustomerSource},
    service::referral_ledger::NewCustomer,
    utils::phone::{normalize_phone, validate_phone},
};

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerDto {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Email is invalid"))]
    pub email: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    pub source: Option<CustomerSource>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub preferences: Option<CustomerPreferences>,
    /// Converts the matching referral instead of creating a plain customer.
    #[validate(length(equal = 6, message = "Referral code must be 6 characters"))]
    pub referral_code: Option<String>,
}

impl CreateCustomerDto {
    pub fn draft(self, business_id: Uuid, now: DateTime<Utc>) -> Result<CustomerDraft, String> {
        let phone = self.phone.as_deref().map(normalize_phone).transpose()?;

        Ok(CustomerDraft {
            id: Uuid::new_v4(),
            business_id,
            user_id: None,
            name: self.name.trim().to_string(),
            email: self.email.map(|e| e.trim().to_lowercase()),
            phone,
            // Referral customers only come out of the ledger.
            source: match self.source.unwrap_or_default() {
                CustomerSource::Referral => CustomerSource::Direct,
                other => other,
            },
            referred_by: None,
            referral_campaign: None,
            tags: self.tags,
            notes: self.notes,
            preferences: self.preferences.unwrap_or_default(),
            created_at: now,
        })
    }

    pub fn into_new_customer(self) -> NewCustomer {
        NewCustomer {
            user_id: None,
            name: Some(self.name),
            email: self.email,
            phone: self.phone,
            tags: self.tags,
            notes: self.notes,
            preferences: self.preferences,
        }
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerDto {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Email is invalid"))]
    pub email: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub preferences: Option<CustomerPreferences>,
}

impl UpdateCustomerDto {
    pub fn changes(self) -> Result<CustomerChanges, String> {
        let phone = self.phone.as_deref().map(normalize_phone).transpose()?;

        Ok(CustomerChanges {
            name: self.name.map(|n| n.trim().to_string()),
            email: self.email.map(|e| e.trim().to_lowercase()),
            phone,
            tags: self.tags,
            notes: self.notes,
            email_notifications: self.preferences.map(|p| p.email_notifications),
            sms_notifications: self.preferences.map(|p| p.sms_notifications),
        })
    }
}

/// Self-service profile edit for a logged-in customer.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerProfileDto {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    pub preferences: Option<CustomerPreferences>,
}

impl UpdateCustomerProfileDto {
    pub fn changes(self) -> Result<CustomerChanges, String> {
        UpdateCustomerDto {
            name: self.name,
            phone: self.phone,
            preferences: self.preferences,
            ..Default::default()
        }
        .changes()
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct CustomerQueryDto {
    pub search: Option<String>,
    pub source: Option<CustomerSource>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
}

/// Landing-page signup through a shared link.
#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSignupDto {
    pub campaign_id: Uuid,
    pub referrer_id: Uuid,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
}

impl PublicSignupDto {
    pub fn new_customer(&self) -> NewCustomer {
        NewCustomer {
            user_id: None,
            name: Some(self.name.clone()),
            email: Some(self.email.clone()),
            phone: self.phone.clone(),
            ..Default::default()
        }
    }
}

/// A customer as shown to the business, with counters inline.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCustomerDto {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: CustomerSource,
    pub referred_by: Option<Uuid>,
    pub tags: Vec<String>,
    pub total_referrals: i64,
    pub successful_referrals: i64,
    pub pending_referrals: i64,
    pub total_rewards_earned: i64,
    pub created_at: DateTime<Utc>,
}

impl FilterCustomerDto {
    pub fn filter_customer(customer: &Customer) -> Self {
        FilterCustomerDto {
            id: customer.id,
            name: customer.name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            source: customer.source,
            referred_by: customer.referred_by,
            tags: customer.tags.clone(),
            total_referrals: customer.referral_stats.total_referrals,
            successful_referrals: customer.referral_stats.successful_referrals,
            pending_referrals: customer.referral_stats.pending_referrals,
            total_rewards_earned: customer.referral_stats.total_rewards_earned,
            created_at: customer.created_at,
        }
    }

    pub fn filter_customers(customers: &[Customer]) -> Vec<FilterCustomerDto> {
        customers.iter().map(FilterCustomerDto::filter_customer).collect()
    }
}
