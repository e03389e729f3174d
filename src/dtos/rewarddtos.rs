use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    campaignmodel::RewardKind,
    rewardmodel::{ClaimDetails, NotificationKind, RecipientType, RewardStatus},
};

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRewardStatusDto {
    pub status: RewardStatus,
    pub claim_details: Option<ClaimDetails>,
    #[serde(default)]
    pub notify_recipient: bool,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRewardCodeDto {
    #[validate(length(min = 2, max = 32, message = "Reward code is required"))]
    pub code: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRewardDto {
    pub claim_details: Option<ClaimDetails>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardNotificationDto {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[validate(length(max = 2000, message = "Message is too long"))]
    pub custom_message: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RewardQueryDto {
    pub campaign_id: Option<Uuid>,
    pub status: Option<RewardStatus>,
    pub recipient_type: Option<RecipientType>,
    #[serde(rename = "type")]
    pub reward_type: Option<RewardKind>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
}
