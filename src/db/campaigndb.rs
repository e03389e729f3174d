use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::campaignmodel::{
    Campaign, CampaignRow, CampaignStatus, ConversionCriteria, RewardRule,
};

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub description: Option<String>,
    pub referrer_reward: RewardRule,
    pub referee_reward: RewardRule,
    pub status: CampaignStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub referral_expiration_days: Option<i32>,
    pub conversion_criteria: ConversionCriteria,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
}

/// Editable campaign fields. Statistics are deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct CampaignChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub referrer_reward: Option<RewardRule>,
    pub referee_reward: Option<RewardRule>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub referral_expiration_days: Option<i32>,
    pub conversion_criteria: Option<ConversionCriteria>,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
}

#[async_trait]
pub trait CampaignExt {
    async fn save_campaign(
        &self,
        business_id: Uuid,
        campaign: NewCampaign,
    ) -> Result<Campaign, sqlx::Error>;

    async fn get_campaign(
        &self,
        business_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<Option<Campaign>, sqlx::Error>;

    async fn get_campaigns(
        &self,
        business_id: Uuid,
        status: Option<CampaignStatus>,
        active: Option<bool>,
        page: u32,
        limit: usize,
    ) -> Result<(Vec<Campaign>, i64), sqlx::Error>;

    async fn update_campaign(
        &self,
        business_id: Uuid,
        campaign_id: Uuid,
        changes: CampaignChanges,
    ) -> Result<Option<Campaign>, sqlx::Error>;

    /// Guarded on the current status so a concurrent change is not overwritten.
    async fn update_campaign_status(
        &self,
        business_id: Uuid,
        campaign_id: Uuid,
        expected: CampaignStatus,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>, sqlx::Error>;

    async fn set_campaign_active(
        &self,
        business_id: Uuid,
        campaign_id: Uuid,
        active: bool,
    ) -> Result<Option<Campaign>, sqlx::Error>;

    async fn cancel_campaign(
        &self,
        business_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<Option<Campaign>, sqlx::Error>;

    async fn get_public_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>, sqlx::Error>;

    async fn get_running_campaigns(
        &self,
        business_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, sqlx::Error>;
}

#[async_trait]
impl CampaignExt for DBClient {
    async fn save_campaign(
        &self,
        business_id: Uuid,
        campaign: NewCampaign,
    ) -> Result<Campaign, sqlx::Error> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            INSERT INTO campaigns (
                business_id, name, description,
                referrer_reward_type, referrer_reward_value, referrer_reward_description,
                referee_reward_type, referee_reward_value, referee_reward_description,
                status, start_date, end_date, referral_expiration_days, conversion_criteria,
                email_subject, email_body
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(business_id)
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(campaign.referrer_reward.kind)
        .bind(campaign.referrer_reward.value)
        .bind(&campaign.referrer_reward.description)
        .bind(campaign.referee_reward.kind)
        .bind(campaign.referee_reward.value)
        .bind(&campaign.referee_reward.description)
        .bind(campaign.status)
        .bind(campaign.start_date)
        .bind(campaign.end_date)
        .bind(campaign.referral_expiration_days)
        .bind(campaign.conversion_criteria)
        .bind(&campaign.email_subject)
        .bind(&campaign.email_body)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get_campaign(
        &self,
        business_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"SELECT * FROM campaigns WHERE id = $1 AND business_id = $2"#,
        )
        .bind(campaign_id)
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Campaign::from))
    }

    async fn get_campaigns(
        &self,
        business_id: Uuid,
        status: Option<CampaignStatus>,
        active: Option<bool>,
        page: u32,
        limit: usize,
    ) -> Result<(Vec<Campaign>, i64), sqlx::Error> {
        let offset = (page.max(1) - 1) as i64 * limit as i64;

        let rows = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT * FROM campaigns
            WHERE business_id = $1
              AND ($2::campaign_status IS NULL OR status = $2)
              AND ($3::boolean IS NULL OR active = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(business_id)
        .bind(status)
        .bind(active)
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM campaigns
            WHERE business_id = $1
              AND ($2::campaign_status IS NULL OR status = $2)
              AND ($3::boolean IS NULL OR active = $3)
            "#,
        )
        .bind(business_id)
        .bind(status)
        .bind(active)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Campaign::from).collect(), total))
    }

    async fn update_campaign(
        &self,
        business_id: Uuid,
        campaign_id: Uuid,
        changes: CampaignChanges,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let referrer = changes.referrer_reward.as_ref();
        let referee = changes.referee_reward.as_ref();

        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            UPDATE campaigns SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                referrer_reward_type = COALESCE($5, referrer_reward_type),
                referrer_reward_value = COALESCE($6, referrer_reward_value),
                referrer_reward_description = COALESCE($7, referrer_reward_description),
                referee_reward_type = COALESCE($8, referee_reward_type),
                referee_reward_value = COALESCE($9, referee_reward_value),
                referee_reward_description = COALESCE($10, referee_reward_description),
                start_date = COALESCE($11, start_date),
                end_date = COALESCE($12, end_date),
                referral_expiration_days = COALESCE($13, referral_expiration_days),
                conversion_criteria = COALESCE($14, conversion_criteria),
                email_subject = COALESCE($15, email_subject),
                email_body = COALESCE($16, email_body),
                updated_at = NOW()
            WHERE id = $1 AND business_id = $2
            RETURNING *
            "#,
        )
        .bind(campaign_id)
        .bind(business_id)
        .bind(changes.name)
        .bind(changes.description)
        .bind(referrer.map(|r| r.kind))
        .bind(referrer.map(|r| r.value))
        .bind(referrer.and_then(|r| r.description.clone()))
        .bind(referee.map(|r| r.kind))
        .bind(referee.map(|r| r.value))
        .bind(referee.and_then(|r| r.description.clone()))
        .bind(changes.start_date)
        .bind(changes.end_date)
        .bind(changes.referral_expiration_days)
        .bind(changes.conversion_criteria)
        .bind(changes.email_subject)
        .bind(changes.email_body)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Campaign::from))
    }

    async fn update_campaign_status(
        &self,
        business_id: Uuid,
        campaign_id: Uuid,
        expected: CampaignStatus,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            UPDATE campaigns SET status = $4, updated_at = NOW()
            WHERE id = $1 AND business_id = $2 AND status = $3
            RETURNING *
            "#,
        )
        .bind(campaign_id)
        .bind(business_id)
        .bind(expected)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Campaign::from))
    }

    async fn set_campaign_active(
        &self,
        business_id: Uuid,
        campaign_id: Uuid,
        active: bool,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            UPDATE campaigns SET active = $3, updated_at = NOW()
            WHERE id = $1 AND business_id = $2
            RETURNING *
            "#,
        )
        .bind(campaign_id)
        .bind(business_id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Campaign::from))
    }

    async fn cancel_campaign(
        &self,
        business_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            UPDATE campaigns SET status = 'cancelled', active = FALSE, updated_at = NOW()
            WHERE id = $1 AND business_id = $2
            RETURNING *
            "#,
        )
        .bind(campaign_id)
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Campaign::from))
    }

    async fn get_public_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>, sqlx::Error> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"SELECT * FROM campaigns WHERE id = $1 AND active = TRUE AND status = 'active'"#,
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Campaign::from))
    }

    async fn get_running_campaigns(
        &self,
        business_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        let rows = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT * FROM campaigns
            WHERE business_id = $1
              AND status = 'active'
              AND active = TRUE
              AND start_date <= $2
              AND (end_date IS NULL OR end_date >= $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(business_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Campaign::from).collect())
    }
}
