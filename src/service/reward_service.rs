use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{
    clock::Clock,
    error::ServiceError,
    notification_service::{Address, NotificationService},
    referral::CodeGenerator,
};
use crate::{
    db::{LedgerStore, RewardStatusUpdate, StoreError},
    mail::mails,
    models::{
        campaignmodel::Campaign,
        referralmodel::Referral,
        rewardmodel::{
            ClaimDetails, ClaimMethod, DeliveryStatus, NotificationChannel, NotificationKind,
            NotificationRecord, RecipientType, Reward, RewardDraft, RewardStatus,
        },
    },
};

const SWEEP_BATCH: i64 = 500;

pub struct RewardService {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn CodeGenerator>,
    notifications: NotificationService,
    expires_after: Duration,
}

impl RewardService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeGenerator>,
        notifications: NotificationService,
        expiration_days: i64,
    ) -> Self {
        RewardService {
            store,
            clock,
            codes,
            notifications,
            expires_after: Duration::days(expiration_days),
        }
    }

    /// Issues a reward from the campaign rule as it stands right now. The
    /// draft is written inside the conversion's transaction, and the store
    /// hands back the existing row for a repeated `(referral, recipient)`, so
    /// issuing twice yields one reward. Later rule edits never reach rewards
    /// that already exist.
    pub fn issue(
        &self,
        referral: &Referral,
        campaign: &Campaign,
        recipient: RecipientType,
        recipient_id: Uuid,
        now: DateTime<Utc>,
    ) -> RewardDraft {
        let rule = campaign.reward_rule(recipient);
        RewardDraft {
            id: Uuid::new_v4(),
            business_id: referral.business_id,
            campaign_id: referral.campaign_id,
            referral_id: referral.id,
            recipient_id,
            recipient_type: recipient,
            reward_type: rule.kind,
            value: rule.value,
            description: rule.description.clone(),
            code: self.codes.reward_code(rule.kind),
            status: RewardStatus::Issued,
            issued_at: Some(now),
            expires_at: now + self.expires_after,
            created_at: now,
        }
    }

    pub async fn get(&self, business_id: Uuid, reward_id: Uuid) -> Result<Reward, ServiceError> {
        self.store
            .load_reward(reward_id)
            .await?
            .filter(|r| r.business_id == business_id)
            .ok_or_else(|| ServiceError::not_found("Reward not found"))
    }

    /// Lazily expires an issued reward that is past its date.
    async fn ensure_redeemable(&self, reward: Reward) -> Result<Reward, ServiceError> {
        match reward.status {
            RewardStatus::Claimed => Err(ServiceError::AlreadyClaimed),
            RewardStatus::Expired => Err(ServiceError::Expired("Reward".to_string())),
            RewardStatus::Pending | RewardStatus::Cancelled => Err(ServiceError::reward_transition(
                reward.status,
                RewardStatus::Claimed,
            )),
            RewardStatus::Issued if reward.is_past_expiry(self.clock.now()) => {
                let now = self.clock.now();
                match self
                    .store
                    .update_reward_status(RewardStatusUpdate {
                        reward_id: reward.id,
                        expected_status: RewardStatus::Issued,
                        new_status: RewardStatus::Expired,
                        at: now,
                        issued_at: None,
                        claimed_at: None,
                        claim_method: None,
                        claim_details: None,
                    })
                    .await
                {
                    Ok(_) | Err(StoreError::Stale { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
                tracing::info!("reward {} expired on redemption attempt", reward.code);
                Err(ServiceError::Expired("Reward".to_string()))
            }
            RewardStatus::Issued => Ok(reward),
        }
    }

    pub async fn claim(
        &self,
        reward_id: Uuid,
        claimant_id: Uuid,
        claim_details: ClaimDetails,
    ) -> Result<Reward, ServiceError> {
        let reward = self
            .store
            .load_reward(reward_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Reward not found"))?;

        if reward.recipient_id != claimant_id {
            return Err(ServiceError::Forbidden(
                "Only the reward recipient can claim it".to_string(),
            ));
        }

        let reward = self.ensure_redeemable(reward).await?;
        let now = self.clock.now();

        let claimed = self
            .store
            .update_reward_status(RewardStatusUpdate {
                reward_id: reward.id,
                expected_status: RewardStatus::Issued,
                new_status: RewardStatus::Claimed,
                at: now,
                issued_at: None,
                claimed_at: Some(now),
                claim_method: Some(ClaimMethod::Code),
                claim_details: Some(claim_details),
            })
            .await;

        match claimed {
            Ok(reward) => {
                tracing::info!("reward {} claimed by customer {}", reward.code, claimant_id);
                Ok(reward)
            }
            Err(StoreError::Stale { .. }) => {
                // Someone else moved it first; report what it is now.
                let current = self
                    .store
                    .load_reward(reward_id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Reward not found"))?;
                Err(self
                    .ensure_redeemable(current)
                    .await
                    .err()
                    .unwrap_or(ServiceError::AlreadyClaimed))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn verify_code(&self, business_id: Uuid, code: &str) -> Result<Reward, ServiceError> {
        let reward = self
            .store
            .find_reward_by_code(business_id, code)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invalid reward code"))?;

        self.ensure_redeemable(reward).await
    }

    /// Business-side status change. `claimed` here is an in-store redemption.
    pub async fn update_status(
        &self,
        business_id: Uuid,
        reward_id: Uuid,
        new_status: RewardStatus,
        claim_details: Option<ClaimDetails>,
        notify_recipient: bool,
    ) -> Result<Reward, ServiceError> {
        let reward = self.get(business_id, reward_id).await?;

        if !reward.status.can_transition_to(new_status) {
            return Err(ServiceError::reward_transition(reward.status, new_status));
        }
        if new_status == RewardStatus::Claimed && reward.is_past_expiry(self.clock.now()) {
            return self.ensure_redeemable(reward).await;
        }

        let now = self.clock.now();
        let mut update = RewardStatusUpdate {
            reward_id,
            expected_status: reward.status,
            new_status,
            at: now,
            issued_at: None,
            claimed_at: None,
            claim_method: None,
            claim_details: None,
        };
        match new_status {
            RewardStatus::Issued => update.issued_at = Some(now),
            RewardStatus::Claimed => {
                update.claimed_at = Some(now);
                update.claim_method = Some(ClaimMethod::Manual);
                update.claim_details = claim_details;
            }
            _ => {}
        }

        let updated = self.store.update_reward_status(update).await.map_err(|e| match e {
            StoreError::Stale { .. } => ServiceError::reward_transition(reward.status, new_status),
            other => other.into(),
        })?;

        tracing::info!(
            "reward {} moved from {} to {}",
            updated.code,
            reward.status,
            updated.status
        );

        if new_status == RewardStatus::Issued && notify_recipient {
            self.notify_issued(&updated);
        }
        Ok(updated)
    }

    pub async fn send_notification(
        &self,
        business_id: Uuid,
        reward_id: Uuid,
        kind: NotificationKind,
        custom_message: Option<String>,
    ) -> Result<NotificationRecord, ServiceError> {
        let reward = self.get(business_id, reward_id).await?;
        let recipient = self
            .store
            .load_customer(reward.recipient_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Recipient not found"))?;
        let email = recipient.email.clone().ok_or_else(|| {
            ServiceError::Validation("Recipient does not have an email address".to_string())
        })?;
        let business = self
            .store
            .load_business(business_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Business profile not found"))?;

        let message = mails::reward_notification(
            kind,
            &business.business_name,
            &recipient.name,
            &reward,
            custom_message.as_deref(),
        );
        let status = match self.notifications.send(&Address::Email(email), &message).await {
            Ok(_) => DeliveryStatus::Sent,
            Err(_) => DeliveryStatus::Failed,
        };

        let record = NotificationRecord {
            kind,
            method: NotificationChannel::Email,
            sent_at: self.clock.now(),
            status,
        };
        self.store
            .append_reward_notification(reward.id, record.clone())
            .await?;
        Ok(record)
    }

    /// Fire-and-forget "your reward is ready" email, recorded on the reward.
    pub fn notify_issued(&self, reward: &Reward) {
        let store = self.store.clone();
        let clock = self.clock.clone();
        let notifications = self.notifications.clone();
        let reward = reward.clone();

        tokio::spawn(async move {
            let recipient = match store.load_customer(reward.recipient_id).await {
                Ok(Some(customer)) => customer,
                _ => return,
            };
            let (Some(email), true) = (recipient.email.clone(), recipient.preferences.email_notifications) else {
                return;
            };
            let business_name = match store.load_business(reward.business_id).await {
                Ok(Some(business)) => business.business_name,
                _ => return,
            };

            let message = mails::reward_notification(
                NotificationKind::Issued,
                &business_name,
                &recipient.name,
                &reward,
                None,
            );
            let status = match notifications.send(&Address::Email(email), &message).await {
                Ok(_) => DeliveryStatus::Sent,
                Err(_) => DeliveryStatus::Failed,
            };
            let record = NotificationRecord {
                kind: NotificationKind::Issued,
                method: NotificationChannel::Email,
                sent_at: clock.now(),
                status,
            };
            if let Err(e) = store.append_reward_notification(reward.id, record).await {
                tracing::warn!("could not record notification for reward {}: {}", reward.id, e);
            }
        });
    }

    /// Marks issued rewards past their expiry as expired. Returns how many moved.
    pub async fn expire_stale(&self) -> Result<usize, ServiceError> {
        let now = self.clock.now();
        let stale = self.store.list_stale_rewards(now, SWEEP_BATCH).await?;
        let mut expired = 0;

        for reward in stale {
            let update = RewardStatusUpdate {
                reward_id: reward.id,
                expected_status: RewardStatus::Issued,
                new_status: RewardStatus::Expired,
                at: now,
                issued_at: None,
                claimed_at: None,
                claim_method: None,
                claim_details: None,
            };
            match self.store.update_reward_status(update).await {
                Ok(_) => expired += 1,
                Err(StoreError::Stale { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if expired > 0 {
            tracing::info!("expired {} rewards", expired);
        }
        Ok(expired)
    }
}
