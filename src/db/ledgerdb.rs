use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgConnection};
use thiserror::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::{
    models::{
        businessmodel::Business,
        campaignmodel::{Campaign, CampaignRow},
        customermodel::{Customer, CustomerDraft},
        referralmodel::{ConversionDetails, FollowUp, Referee, Referral, ReferralRow, ReferralStatus, SharingMethod},
        rewardmodel::{ClaimDetails, ClaimMethod, NotificationRecord, RecipientType, Reward, RewardDraft, RewardStatus},
    },
    service::transitions::{CampaignDelta, CustomerDelta},
};

const REFERRAL_CODE_KEY: &str = "referrals_referral_code_key";
const REWARD_CODE_KEY: &str = "rewards_code_key";
const CUSTOMER_EMAIL_KEY: &str = "customers_business_email_key";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("referral code {0} is already taken")]
    DuplicateReferralCode(String),

    #[error("reward code {0} is already taken")]
    DuplicateRewardCode(String),

    #[error("A customer with email {0} already exists")]
    DuplicateCustomerEmail(String),

    #[error("{entity} {id} was changed by another request")]
    Stale { entity: &'static str, id: Uuid },

    #[error("{0} not found")]
    Missing(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone)]
pub struct ReferralDraft {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub business_id: Uuid,
    pub referrer_id: Uuid,
    pub referee: Referee,
    pub referral_code: String,
    pub referral_link: String,
    pub sharing_method: SharingMethod,
    pub expires_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub campaign_delta: CampaignDelta,
    pub referrer_delta: CustomerDelta,
}

impl ReferralDraft {
    pub fn into_referral(self) -> Referral {
        Referral {
            id: self.id,
            campaign_id: self.campaign_id,
            business_id: self.business_id,
            referrer_id: self.referrer_id,
            referee: self.referee,
            status: ReferralStatus::Pending,
            referral_code: self.referral_code,
            referral_link: self.referral_link,
            click_count: 0,
            last_clicked_at: None,
            conversion_details: None,
            sharing_method: self.sharing_method,
            follow_ups: Vec::new(),
            expires_at: self.expires_at,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClickUpdate {
    pub referral_id: Uuid,
    pub expected_status: ReferralStatus,
    pub new_status: ReferralStatus,
    pub clicked_at: DateTime<Utc>,
    pub campaign_delta: CampaignDelta,
}

#[derive(Debug, Clone)]
pub enum RefereeLink {
    Keep,
    Existing(Uuid),
    Create(CustomerDraft),
}

/// Everything one referral status change writes. Applied all-or-nothing.
#[derive(Debug, Clone)]
pub struct TransitionUnit {
    pub referral_id: Uuid,
    pub expected_status: ReferralStatus,
    pub new_status: ReferralStatus,
    pub at: DateTime<Utc>,
    pub conversion: Option<ConversionDetails>,
    pub referee: RefereeLink,
    pub campaign_delta: CampaignDelta,
    pub referrer_delta: CustomerDelta,
    pub rewards: Vec<RewardDraft>,
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub referral: Referral,
    pub referee: Option<Customer>,
    pub rewards: Vec<Reward>,
}

#[derive(Debug, Clone)]
pub struct RewardStatusUpdate {
    pub reward_id: Uuid,
    pub expected_status: RewardStatus,
    pub new_status: RewardStatus,
    pub at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claim_method: Option<ClaimMethod>,
    pub claim_details: Option<ClaimDetails>,
}

/// Persistence seam of the referral ledger and reward issuance.
///
/// Lookups are unscoped; callers check `business_id` themselves so a miss and a
/// foreign row look the same to the client. Every write method is atomic.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load_business(&self, business_id: Uuid) -> Result<Option<Business>, StoreError>;
    async fn load_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>, StoreError>;
    async fn load_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, StoreError>;
    async fn find_customer_by_email(
        &self,
        business_id: Uuid,
        email: &str,
    ) -> Result<Option<Customer>, StoreError>;

    async fn load_referral(&self, referral_id: Uuid) -> Result<Option<Referral>, StoreError>;
    async fn find_referral_by_code(&self, code: &str) -> Result<Option<Referral>, StoreError>;
    async fn find_latest_campaign_referral(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<Referral>, StoreError>;
    async fn find_open_referral(
        &self,
        campaign_id: Uuid,
        referrer_id: Uuid,
        referee_email: &str,
    ) -> Result<Option<Referral>, StoreError>;
    async fn list_stale_referrals(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Referral>, StoreError>;

    async fn load_reward(&self, reward_id: Uuid) -> Result<Option<Reward>, StoreError>;
    async fn find_reward_for(
        &self,
        referral_id: Uuid,
        recipient: RecipientType,
    ) -> Result<Option<Reward>, StoreError>;
    async fn find_reward_by_code(
        &self,
        business_id: Uuid,
        code: &str,
    ) -> Result<Option<Reward>, StoreError>;
    async fn list_stale_rewards(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Reward>, StoreError>;

    async fn insert_referral(&self, draft: ReferralDraft) -> Result<Referral, StoreError>;
    async fn record_click(&self, click: ClickUpdate) -> Result<Referral, StoreError>;
    async fn commit_transition(&self, unit: TransitionUnit) -> Result<TransitionOutcome, StoreError>;
    async fn update_reward_status(&self, update: RewardStatusUpdate) -> Result<Reward, StoreError>;
    async fn append_follow_up(
        &self,
        referral_id: Uuid,
        follow_up: FollowUp,
    ) -> Result<Referral, StoreError>;
    async fn append_reward_notification(
        &self,
        reward_id: Uuid,
        record: NotificationRecord,
    ) -> Result<Reward, StoreError>;
}

fn violated_constraint(err: &sqlx::Error) -> Option<String> {
    let db_err = err.as_database_error()?;
    if db_err.is_unique_violation() {
        db_err.constraint().map(str::to_string)
    } else {
        None
    }
}

async fn apply_campaign_delta(
    conn: &mut PgConnection,
    campaign_id: Uuid,
    delta: &CampaignDelta,
) -> Result<(), StoreError> {
    if delta.is_empty() {
        return Ok(());
    }

    let result = sqlx::query(
        r#"
        UPDATE campaigns SET
            total_referrals = GREATEST(total_referrals + $2, 0),
            pending_referrals = GREATEST(pending_referrals + $3, 0),
            clicked_referrals = GREATEST(clicked_referrals + $4, 0),
            successful_referrals = GREATEST(successful_referrals + $5, 0),
            total_rewards = GREATEST(total_rewards + $6, 0),
            total_rewards_value = GREATEST(total_rewards_value + $7, 0),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(campaign_id)
    .bind(delta.total_referrals)
    .bind(delta.pending_referrals)
    .bind(delta.clicked_referrals)
    .bind(delta.successful_referrals)
    .bind(delta.total_rewards)
    .bind(delta.total_rewards_value)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Missing(format!("Campaign {}", campaign_id)));
    }
    Ok(())
}

async fn apply_customer_delta(
    conn: &mut PgConnection,
    customer_id: Uuid,
    delta: &CustomerDelta,
) -> Result<(), StoreError> {
    if delta.is_empty() {
        return Ok(());
    }

    let result = sqlx::query(
        r#"
        UPDATE customers SET
            total_referrals = GREATEST(total_referrals + $2, 0),
            pending_referrals = GREATEST(pending_referrals + $3, 0),
            successful_referrals = GREATEST(successful_referrals + $4, 0),
            total_rewards_earned = GREATEST(total_rewards_earned + $5, 0),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(customer_id)
    .bind(delta.total_referrals)
    .bind(delta.pending_referrals)
    .bind(delta.successful_referrals)
    .bind(delta.total_rewards_earned)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Missing(format!("Customer {}", customer_id)));
    }
    Ok(())
}

pub(crate) async fn insert_customer_in(
    conn: &mut PgConnection,
    draft: &CustomerDraft,
) -> Result<Customer, StoreError> {
    sqlx::query_as::<_, Customer>(
        r#"
        INSERT INTO customers (
            id, business_id, user_id, name, email, phone, source, referred_by,
            referral_campaign, tags, notes, email_notifications, sms_notifications,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
        RETURNING *
        "#,
    )
    .bind(draft.id)
    .bind(draft.business_id)
    .bind(draft.user_id)
    .bind(&draft.name)
    .bind(&draft.email)
    .bind(&draft.phone)
    .bind(draft.source)
    .bind(draft.referred_by)
    .bind(draft.referral_campaign)
    .bind(&draft.tags)
    .bind(&draft.notes)
    .bind(draft.preferences.email_notifications)
    .bind(draft.preferences.sms_notifications)
    .bind(draft.created_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match violated_constraint(&e).as_deref() {
        Some(CUSTOMER_EMAIL_KEY) => {
            StoreError::DuplicateCustomerEmail(draft.email.clone().unwrap_or_default())
        }
        _ => StoreError::Database(e),
    })
}

async fn insert_reward_in(
    conn: &mut PgConnection,
    draft: &RewardDraft,
) -> Result<Reward, StoreError> {
    let inserted = sqlx::query_as::<_, Reward>(
        r#"
        INSERT INTO rewards (
            id, business_id, campaign_id, referral_id, recipient_id, recipient_type,
            reward_type, value, description, code, status, issued_at, expires_at,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
        ON CONFLICT (referral_id, recipient_type) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(draft.id)
    .bind(draft.business_id)
    .bind(draft.campaign_id)
    .bind(draft.referral_id)
    .bind(draft.recipient_id)
    .bind(draft.recipient_type)
    .bind(draft.reward_type)
    .bind(draft.value)
    .bind(&draft.description)
    .bind(&draft.code)
    .bind(draft.status)
    .bind(draft.issued_at)
    .bind(draft.expires_at)
    .bind(draft.created_at)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| match violated_constraint(&e).as_deref() {
        Some(REWARD_CODE_KEY) => StoreError::DuplicateRewardCode(draft.code.clone()),
        _ => StoreError::Database(e),
    })?;

    if let Some(reward) = inserted {
        return Ok(reward);
    }

    let existing = sqlx::query_as::<_, Reward>(
        r#"SELECT * FROM rewards WHERE referral_id = $1 AND recipient_type = $2"#,
    )
    .bind(draft.referral_id)
    .bind(draft.recipient_type)
    .fetch_one(&mut *conn)
    .await?;

    Ok(existing)
}

#[async_trait]
impl LedgerStore for DBClient {
    async fn load_business(&self, business_id: Uuid) -> Result<Option<Business>, StoreError> {
        let business = sqlx::query_as::<_, Business>(r#"SELECT * FROM businesses WHERE id = $1"#)
            .bind(business_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(business)
    }

    async fn load_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>, StoreError> {
        let row = sqlx::query_as::<_, CampaignRow>(r#"SELECT * FROM campaigns WHERE id = $1"#)
            .bind(campaign_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Campaign::from))
    }

    async fn load_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, StoreError> {
        let customer = sqlx::query_as::<_, Customer>(r#"SELECT * FROM customers WHERE id = $1"#)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    async fn find_customer_by_email(
        &self,
        business_id: Uuid,
        email: &str,
    ) -> Result<Option<Customer>, StoreError> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"SELECT * FROM customers WHERE business_id = $1 AND LOWER(email) = LOWER($2)"#,
        )
        .bind(business_id)
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(customer)
    }

    async fn load_referral(&self, referral_id: Uuid) -> Result<Option<Referral>, StoreError> {
        let row = sqlx::query_as::<_, ReferralRow>(r#"SELECT * FROM referrals WHERE id = $1"#)
            .bind(referral_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Referral::from))
    }

    async fn find_referral_by_code(&self, code: &str) -> Result<Option<Referral>, StoreError> {
        let row = sqlx::query_as::<_, ReferralRow>(
            r#"SELECT * FROM referrals WHERE referral_code = $1"#,
        )
        .bind(code.trim().to_uppercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Referral::from))
    }

    async fn find_latest_campaign_referral(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<Referral>, StoreError> {
        let row = sqlx::query_as::<_, ReferralRow>(
            r#"
            SELECT * FROM referrals
            WHERE campaign_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Referral::from))
    }

    async fn find_open_referral(
        &self,
        campaign_id: Uuid,
        referrer_id: Uuid,
        referee_email: &str,
    ) -> Result<Option<Referral>, StoreError> {
        let row = sqlx::query_as::<_, ReferralRow>(
            r#"
            SELECT * FROM referrals
            WHERE campaign_id = $1
              AND referrer_id = $2
              AND LOWER(referee_email) = LOWER($3)
              AND status IN ('pending', 'clicked')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(campaign_id)
        .bind(referrer_id)
        .bind(referee_email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Referral::from))
    }

    async fn list_stale_referrals(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Referral>, StoreError> {
        let rows = sqlx::query_as::<_, ReferralRow>(
            r#"
            SELECT * FROM referrals
            WHERE status IN ('pending', 'clicked') AND expires_at < $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Referral::from).collect())
    }

    async fn load_reward(&self, reward_id: Uuid) -> Result<Option<Reward>, StoreError> {
        let reward = sqlx::query_as::<_, Reward>(r#"SELECT * FROM rewards WHERE id = $1"#)
            .bind(reward_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reward)
    }

    async fn find_reward_for(
        &self,
        referral_id: Uuid,
        recipient: RecipientType,
    ) -> Result<Option<Reward>, StoreError> {
        let reward = sqlx::query_as::<_, Reward>(
            r#"SELECT * FROM rewards WHERE referral_id = $1 AND recipient_type = $2"#,
        )
        .bind(referral_id)
        .bind(recipient)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reward)
    }

    async fn find_reward_by_code(
        &self,
        business_id: Uuid,
        code: &str,
    ) -> Result<Option<Reward>, StoreError> {
        let reward = sqlx::query_as::<_, Reward>(
            r#"SELECT * FROM rewards WHERE business_id = $1 AND code = $2"#,
        )
        .bind(business_id)
        .bind(code.trim().to_uppercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(reward)
    }

    async fn list_stale_rewards(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Reward>, StoreError> {
        let rewards = sqlx::query_as::<_, Reward>(
            r#"
            SELECT * FROM rewards
            WHERE status = 'issued' AND expires_at < $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rewards)
    }

    async fn insert_referral(&self, draft: ReferralDraft) -> Result<Referral, StoreError> {
        let mut tx = self.pool.begin().await?;
        let contact = draft.referee.contact();

        let row = sqlx::query_as::<_, ReferralRow>(
            r#"
            INSERT INTO referrals (
                id, campaign_id, business_id, referrer_id, referee_name, referee_email,
                referee_phone, referee_customer_id, status, referral_code, referral_link,
                sharing_method, expires_at, notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, $10, $11, $12, $13, $14, $14)
            RETURNING *
            "#,
        )
        .bind(draft.id)
        .bind(draft.campaign_id)
        .bind(draft.business_id)
        .bind(draft.referrer_id)
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(draft.referee.customer_id())
        .bind(&draft.referral_code)
        .bind(&draft.referral_link)
        .bind(draft.sharing_method)
        .bind(draft.expires_at)
        .bind(&draft.notes)
        .bind(draft.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match violated_constraint(&e).as_deref() {
            Some(REFERRAL_CODE_KEY) => StoreError::DuplicateReferralCode(draft.referral_code.clone()),
            _ => StoreError::Database(e),
        })?;

        apply_campaign_delta(&mut *tx, draft.campaign_id, &draft.campaign_delta).await?;
        apply_customer_delta(&mut *tx, draft.referrer_id, &draft.referrer_delta).await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn record_click(&self, click: ClickUpdate) -> Result<Referral, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ReferralRow>(
            r#"
            UPDATE referrals SET
                status = $3,
                click_count = click_count + 1,
                last_clicked_at = $4,
                updated_at = $4
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(click.referral_id)
        .bind(click.expected_status)
        .bind(click.new_status)
        .bind(click.clicked_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::Stale {
            entity: "Referral",
            id: click.referral_id,
        })?;

        apply_campaign_delta(&mut *tx, row.campaign_id, &click.campaign_delta).await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn commit_transition(&self, unit: TransitionUnit) -> Result<TransitionOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let conversion = unit.conversion.as_ref();

        let mut row = sqlx::query_as::<_, ReferralRow>(
            r#"
            UPDATE referrals SET
                status = $3,
                converted_at = COALESCE($4, converted_at),
                conversion_type = COALESCE($5, conversion_type),
                conversion_value = COALESCE($6, conversion_value),
                conversion_notes = COALESCE($7, conversion_notes),
                updated_at = $8
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(unit.referral_id)
        .bind(unit.expected_status)
        .bind(unit.new_status)
        .bind(conversion.and_then(|c| c.converted_at))
        .bind(conversion.and_then(|c| c.conversion_type.clone()))
        .bind(conversion.and_then(|c| c.conversion_value))
        .bind(conversion.and_then(|c| c.notes.clone()))
        .bind(unit.at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::Stale {
            entity: "Referral",
            id: unit.referral_id,
        })?;

        let referee_id = match &unit.referee {
            RefereeLink::Keep => None,
            RefereeLink::Existing(id) => Some(*id),
            RefereeLink::Create(draft) => Some(insert_customer_in(&mut *tx, draft).await?.id),
        };

        let mut referee = None;
        if let Some(customer_id) = referee_id {
            row = sqlx::query_as::<_, ReferralRow>(
                r#"
                UPDATE referrals SET referee_customer_id = $2, updated_at = $3
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(unit.referral_id)
            .bind(customer_id)
            .bind(unit.at)
            .fetch_one(&mut *tx)
            .await?;

            referee = sqlx::query_as::<_, Customer>(r#"SELECT * FROM customers WHERE id = $1"#)
                .bind(customer_id)
                .fetch_optional(&mut *tx)
                .await?;
        }

        apply_campaign_delta(&mut *tx, row.campaign_id, &unit.campaign_delta).await?;
        apply_customer_delta(&mut *tx, row.referrer_id, &unit.referrer_delta).await?;

        let mut rewards = Vec::with_capacity(unit.rewards.len());
        for draft in &unit.rewards {
            rewards.push(insert_reward_in(&mut *tx, draft).await?);
        }

        tx.commit().await?;

        Ok(TransitionOutcome {
            referral: row.into(),
            referee,
            rewards,
        })
    }

    async fn update_reward_status(&self, update: RewardStatusUpdate) -> Result<Reward, StoreError> {
        let reward = sqlx::query_as::<_, Reward>(
            r#"
            UPDATE rewards SET
                status = $3,
                issued_at = COALESCE($5, issued_at),
                claimed_at = COALESCE($6, claimed_at),
                claim_method = COALESCE($7, claim_method),
                claim_details = COALESCE($8, claim_details),
                updated_at = $4
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(update.reward_id)
        .bind(update.expected_status)
        .bind(update.new_status)
        .bind(update.at)
        .bind(update.issued_at)
        .bind(update.claimed_at)
        .bind(update.claim_method)
        .bind(update.claim_details.map(Json))
        .fetch_optional(&self.pool)
        .await?;

        reward.ok_or(StoreError::Stale {
            entity: "Reward",
            id: update.reward_id,
        })
    }

    async fn append_follow_up(
        &self,
        referral_id: Uuid,
        follow_up: FollowUp,
    ) -> Result<Referral, StoreError> {
        let row = sqlx::query_as::<_, ReferralRow>(
            r#"
            UPDATE referrals SET
                follow_ups = follow_ups || jsonb_build_array($2::jsonb),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(referral_id)
        .bind(Json(follow_up))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Referral::from)
            .ok_or_else(|| StoreError::Missing(format!("Referral {}", referral_id)))
    }

    async fn append_reward_notification(
        &self,
        reward_id: Uuid,
        record: NotificationRecord,
    ) -> Result<Reward, StoreError> {
        let reward = sqlx::query_as::<_, Reward>(
            r#"
            UPDATE rewards SET
                notifications_sent = notifications_sent || jsonb_build_array($2::jsonb),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(reward_id)
        .bind(Json(record))
        .fetch_optional(&self.pool)
        .await?;

        reward.ok_or_else(|| StoreError::Missing(format!("Reward {}", reward_id)))
    }
}
