use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{
    db::{CampaignChanges, NewCampaign},
    models::campaignmodel::{
        Campaign, CampaignStatistics, CampaignStatus, ConversionCriteria, RewardKind, RewardRule,
    },
};

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[validate(schema(function = "validate_percentage"))]
pub struct RewardRuleDto {
    #[serde(rename = "type")]
    pub kind: RewardKind,
    #[validate(range(min = 0.0, message = "Reward value cannot be negative"))]
    pub value: f64,
    pub description: Option<String>,
}

impl From<RewardRuleDto> for RewardRule {
    fn from(dto: RewardRuleDto) -> Self {
        RewardRule {
            kind: dto.kind,
            value: dto.value,
            description: dto.description,
        }
    }
}

fn validate_percentage(rule: &RewardRuleDto) -> Result<(), ValidationError> {
    if rule.kind == RewardKind::Percentage && rule.value > 100.0 {
        let mut error = ValidationError::new("invalid_percentage");
        error.message = Some("Percentage rewards cannot exceed 100".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignDto {
    #[validate(length(min = 1, max = 120, message = "Campaign name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate]
    pub referrer_reward: RewardRuleDto,
    #[validate]
    pub referee_reward: RewardRuleDto,
    pub status: Option<CampaignStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 365, message = "Expiration must be between 1 and 365 days"))]
    pub referral_expiration_days: Option<i32>,
    pub conversion_criteria: Option<ConversionCriteria>,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
}

impl CreateCampaignDto {
    pub fn into_new_campaign(self, now: DateTime<Utc>) -> NewCampaign {
        NewCampaign {
            name: self.name.trim().to_string(),
            description: self.description,
            referrer_reward: self.referrer_reward.into(),
            referee_reward: self.referee_reward.into(),
            status: self.status.unwrap_or_default(),
            start_date: self.start_date.unwrap_or(now),
            end_date: self.end_date,
            referral_expiration_days: self.referral_expiration_days,
            conversion_criteria: self.conversion_criteria.unwrap_or_default(),
            email_subject: self.email_subject,
            email_body: self.email_body,
        }
    }
}

/// Statistics are not accepted here; they belong to the referral ledger.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignDto {
    #[validate(length(min = 1, max = 120, message = "Campaign name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate]
    pub referrer_reward: Option<RewardRuleDto>,
    #[validate]
    pub referee_reward: Option<RewardRuleDto>,
    pub status: Option<CampaignStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 365, message = "Expiration must be between 1 and 365 days"))]
    pub referral_expiration_days: Option<i32>,
    pub conversion_criteria: Option<ConversionCriteria>,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
}

impl UpdateCampaignDto {
    pub fn changes(&self) -> CampaignChanges {
        CampaignChanges {
            name: self.name.as_ref().map(|n| n.trim().to_string()),
            description: self.description.clone(),
            referrer_reward: self.referrer_reward.clone().map(RewardRule::from),
            referee_reward: self.referee_reward.clone().map(RewardRule::from),
            start_date: self.start_date,
            end_date: self.end_date,
            referral_expiration_days: self.referral_expiration_days,
            conversion_criteria: self.conversion_criteria,
            email_subject: self.email_subject.clone(),
            email_body: self.email_body.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct CampaignQueryDto {
    pub status: Option<CampaignStatus>,
    pub active: Option<bool>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatsDto {
    pub campaign_id: uuid::Uuid,
    pub name: String,
    pub status: CampaignStatus,
    pub statistics: CampaignStatistics,
    pub conversion_rate: f64,
}

impl CampaignStatsDto {
    pub fn from_campaign(campaign: &Campaign) -> Self {
        CampaignStatsDto {
            campaign_id: campaign.id,
            name: campaign.name.clone(),
            status: campaign.status,
            statistics: campaign.statistics,
            conversion_rate: campaign.statistics.conversion_rate(),
        }
    }
}

/// What a landing page may show about a campaign: no statistics, no copy
/// templates.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCampaignDto {
    pub id: uuid::Uuid,
    pub business_id: uuid::Uuid,
    pub name: String,
    pub description: Option<String>,
    pub referrer_reward: RewardRule,
    pub referee_reward: RewardRule,
    pub end_date: Option<DateTime<Utc>>,
}

impl PublicCampaignDto {
    pub fn from_campaign(campaign: Campaign) -> Self {
        PublicCampaignDto {
            id: campaign.id,
            business_id: campaign.business_id,
            name: campaign.name,
            description: campaign.description,
            referrer_reward: campaign.referrer_reward,
            referee_reward: campaign.referee_reward,
            end_date: campaign.end_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(kind: RewardKind, value: f64) -> RewardRuleDto {
        RewardRuleDto {
            kind,
            value,
            description: None,
        }
    }

    fn dto() -> CreateCampaignDto {
        CreateCampaignDto {
            name: "Spring".into(),
            description: None,
            referrer_reward: rule(RewardKind::Fixed, 10.0),
            referee_reward: rule(RewardKind::Percentage, 15.0),
            status: None,
            start_date: None,
            end_date: None,
            referral_expiration_days: None,
            conversion_criteria: None,
            email_subject: None,
            email_body: None,
        }
    }

    #[test]
    fn percentage_over_one_hundred_is_rejected() {
        let mut body = dto();
        body.referee_reward = rule(RewardKind::Percentage, 150.0);
        assert!(body.validate().is_err());
    }

    #[test]
    fn negative_values_are_rejected() {
        let mut body = dto();
        body.referrer_reward = rule(RewardKind::Fixed, -1.0);
        assert!(body.validate().is_err());
    }

    #[test]
    fn defaults_fill_in_status_and_start() {
        let now = Utc::now();
        let campaign = dto().into_new_campaign(now);
        assert_eq!(campaign.status, CampaignStatus::Active);
        assert_eq!(campaign.start_date, now);
        assert_eq!(campaign.conversion_criteria, ConversionCriteria::Form);
    }
}
