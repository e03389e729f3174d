use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{
        customermodel::CustomerPreferences,
        referralmodel::{
            ConversionDetails, FollowUpMethod, RefereeContact, ReferralStatus, SharingMethod,
        },
    },
    service::referral_ledger::{NewCustomer, NewReferral},
    utils::phone::validate_phone,
};

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReferralDto {
    pub campaign_id: Uuid,
    pub referrer_id: Uuid,
    #[validate(length(min = 1, message = "Referee name is required"))]
    pub referee_name: String,
    #[validate(
        length(min = 1, message = "Referee email is required"),
        email(message = "Referee email is invalid")
    )]
    pub referee_email: String,
    #[validate(custom = "validate_phone")]
    pub referee_phone: Option<String>,
    pub sharing_method: Option<SharingMethod>,
    pub notes: Option<String>,
}

impl From<CreateReferralDto> for NewReferral {
    fn from(dto: CreateReferralDto) -> Self {
        NewReferral {
            campaign_id: dto.campaign_id,
            referrer_id: dto.referrer_id,
            referee: RefereeContact {
                name: dto.referee_name,
                email: dto.referee_email,
                phone: dto.referee_phone,
            },
            sharing_method: dto.sharing_method.unwrap_or_default(),
            notes: dto.notes,
        }
    }
}

/// Referral a logged-in customer creates for themselves.
#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReferralDto {
    pub campaign_id: Uuid,
    #[validate(length(min = 1, message = "Referee name is required"))]
    pub referee_name: String,
    #[validate(
        length(min = 1, message = "Referee email is required"),
        email(message = "Referee email is invalid")
    )]
    pub referee_email: String,
    #[validate(custom = "validate_phone")]
    pub referee_phone: Option<String>,
    pub sharing_method: Option<SharingMethod>,
}

impl GenerateReferralDto {
    pub fn for_referrer(self, referrer_id: Uuid) -> NewReferral {
        NewReferral {
            campaign_id: self.campaign_id,
            referrer_id,
            referee: RefereeContact {
                name: self.referee_name,
                email: self.referee_email,
                phone: self.referee_phone,
            },
            sharing_method: self.sharing_method.unwrap_or(SharingMethod::Copy),
            notes: None,
        }
    }
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReferralStatusDto {
    pub status: ReferralStatus,
    pub conversion_details: Option<ConversionDetails>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRefereeDto {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Email is invalid"))]
    pub email: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub preferences: Option<CustomerPreferences>,
    pub conversion_details: Option<ConversionDetails>,
}

impl ConvertRefereeDto {
    pub fn split(self) -> (NewCustomer, Option<ConversionDetails>) {
        let customer = NewCustomer {
            user_id: None,
            name: self.name,
            email: self.email,
            phone: self.phone,
            tags: self.tags,
            notes: self.notes,
            preferences: self.preferences,
        };
        (customer, self.conversion_details)
    }
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpDto {
    pub method: FollowUpMethod,
    #[validate(length(min = 1, max = 2000, message = "Message must be 1 to 2000 characters"))]
    pub message: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReferralQueryDto {
    pub status: Option<ReferralStatus>,
    pub campaign_id: Option<Uuid>,
    pub referrer_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
}
