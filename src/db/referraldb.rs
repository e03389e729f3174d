use async_trait::async_trait;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::{
    campaignmodel::RewardKind,
    referralmodel::{Referral, ReferralRow, ReferralStatus},
    rewardmodel::{RecipientType, Reward, RewardStatus},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferralFilter {
    pub status: Option<ReferralStatus>,
    pub campaign_id: Option<Uuid>,
    pub referrer_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RewardFilter {
    pub campaign_id: Option<Uuid>,
    pub status: Option<RewardStatus>,
    pub recipient_type: Option<RecipientType>,
    pub reward_type: Option<RewardKind>,
}

/// Read side of referrals. Writes go through the ledger.
#[async_trait]
pub trait ReferralExt {
    async fn get_referral(
        &self,
        business_id: Uuid,
        referral_id: Uuid,
    ) -> Result<Option<Referral>, sqlx::Error>;

    async fn get_referrals(
        &self,
        business_id: Uuid,
        filter: ReferralFilter,
        page: u32,
        limit: usize,
    ) -> Result<(Vec<Referral>, i64), sqlx::Error>;

    async fn get_customer_referrals(&self, referrer_id: Uuid) -> Result<Vec<Referral>, sqlx::Error>;
}

#[async_trait]
pub trait RewardExt {
    async fn get_reward(
        &self,
        business_id: Uuid,
        reward_id: Uuid,
    ) -> Result<Option<Reward>, sqlx::Error>;

    async fn get_rewards(
        &self,
        business_id: Uuid,
        filter: RewardFilter,
        page: u32,
        limit: usize,
    ) -> Result<(Vec<Reward>, i64), sqlx::Error>;

    async fn get_customer_rewards(&self, recipient_id: Uuid) -> Result<Vec<Reward>, sqlx::Error>;
}

#[async_trait]
impl ReferralExt for DBClient {
    async fn get_referral(
        &self,
        business_id: Uuid,
        referral_id: Uuid,
    ) -> Result<Option<Referral>, sqlx::Error> {
        let row = sqlx::query_as::<_, ReferralRow>(
            r#"SELECT * FROM referrals WHERE id = $1 AND business_id = $2"#,
        )
        .bind(referral_id)
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Referral::from))
    }

    async fn get_referrals(
        &self,
        business_id: Uuid,
        filter: ReferralFilter,
        page: u32,
        limit: usize,
    ) -> Result<(Vec<Referral>, i64), sqlx::Error> {
        let offset = (page.max(1) - 1) as i64 * limit as i64;

        let rows = sqlx::query_as::<_, ReferralRow>(
            r#"
            SELECT * FROM referrals
            WHERE business_id = $1
              AND ($2::referral_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR campaign_id = $3)
              AND ($4::uuid IS NULL OR referrer_id = $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(business_id)
        .bind(filter.status)
        .bind(filter.campaign_id)
        .bind(filter.referrer_id)
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM referrals
            WHERE business_id = $1
              AND ($2::referral_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR campaign_id = $3)
              AND ($4::uuid IS NULL OR referrer_id = $4)
            "#,
        )
        .bind(business_id)
        .bind(filter.status)
        .bind(filter.campaign_id)
        .bind(filter.referrer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Referral::from).collect(), total))
    }

    async fn get_customer_referrals(&self, referrer_id: Uuid) -> Result<Vec<Referral>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ReferralRow>(
            r#"SELECT * FROM referrals WHERE referrer_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(referrer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Referral::from).collect())
    }
}

#[async_trait]
impl RewardExt for DBClient {
    async fn get_reward(
        &self,
        business_id: Uuid,
        reward_id: Uuid,
    ) -> Result<Option<Reward>, sqlx::Error> {
        sqlx::query_as::<_, Reward>(r#"SELECT * FROM rewards WHERE id = $1 AND business_id = $2"#)
            .bind(reward_id)
            .bind(business_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_rewards(
        &self,
        business_id: Uuid,
        filter: RewardFilter,
        page: u32,
        limit: usize,
    ) -> Result<(Vec<Reward>, i64), sqlx::Error> {
        let offset = (page.max(1) - 1) as i64 * limit as i64;

        let rewards = sqlx::query_as::<_, Reward>(
            r#"
            SELECT * FROM rewards
            WHERE business_id = $1
              AND ($2::uuid IS NULL OR campaign_id = $2)
              AND ($3::reward_status IS NULL OR status = $3)
              AND ($4::recipient_type IS NULL OR recipient_type = $4)
              AND ($5::reward_kind IS NULL OR reward_type = $5)
            ORDER BY created_at DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(business_id)
        .bind(filter.campaign_id)
        .bind(filter.status)
        .bind(filter.recipient_type)
        .bind(filter.reward_type)
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM rewards
            WHERE business_id = $1
              AND ($2::uuid IS NULL OR campaign_id = $2)
              AND ($3::reward_status IS NULL OR status = $3)
              AND ($4::recipient_type IS NULL OR recipient_type = $4)
              AND ($5::reward_kind IS NULL OR reward_type = $5)
            "#,
        )
        .bind(business_id)
        .bind(filter.campaign_id)
        .bind(filter.status)
        .bind(filter.recipient_type)
        .bind(filter.reward_type)
        .fetch_one(&self.pool)
        .await?;

        Ok((rewards, total))
    }

    async fn get_customer_rewards(&self, recipient_id: Uuid) -> Result<Vec<Reward>, sqlx::Error> {
        sqlx::query_as::<_, Reward>(
            r#"SELECT * FROM rewards WHERE recipient_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await
    }
}
