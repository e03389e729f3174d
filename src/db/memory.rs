// In-memory LedgerStore used by the service tests.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::ledgerdb::{
    ClickUpdate, LedgerStore, RefereeLink, ReferralDraft, RewardStatusUpdate, StoreError,
    TransitionOutcome, TransitionUnit,
};
use crate::models::{
    businessmodel::Business,
    campaignmodel::Campaign,
    customermodel::Customer,
    referralmodel::{FollowUp, Referral},
    rewardmodel::{NotificationRecord, RecipientType, Reward, RewardDraft, RewardStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertReferral,
    RecordClick,
    /// Fails after the referral row and counters were staged, before rewards.
    TransitionRewards,
    UpdateReward,
}

#[derive(Debug, Clone, Default)]
struct State {
    businesses: HashMap<Uuid, Business>,
    campaigns: HashMap<Uuid, Campaign>,
    customers: HashMap<Uuid, Customer>,
    referrals: HashMap<Uuid, Referral>,
    rewards: HashMap<Uuid, Reward>,
}

impl State {
    fn campaign_mut(&mut self, id: Uuid) -> Result<&mut Campaign, StoreError> {
        self.campaigns
            .get_mut(&id)
            .ok_or_else(|| StoreError::Missing(format!("Campaign {}", id)))
    }

    fn customer_mut(&mut self, id: Uuid) -> Result<&mut Customer, StoreError> {
        self.customers
            .get_mut(&id)
            .ok_or_else(|| StoreError::Missing(format!("Customer {}", id)))
    }

    fn insert_reward(&mut self, draft: RewardDraft) -> Result<Reward, StoreError> {
        if let Some(existing) = self
            .rewards
            .values()
            .find(|r| r.referral_id == draft.referral_id && r.recipient_type == draft.recipient_type)
        {
            return Ok(existing.clone());
        }
        if self.rewards.values().any(|r| r.code == draft.code) {
            return Err(StoreError::DuplicateRewardCode(draft.code));
        }
        let reward = draft.into_reward();
        self.rewards.insert(reward.id, reward.clone());
        Ok(reward)
    }
}

/// Writes stage against a clone of the state and swap it in only on success,
/// which gives the same all-or-nothing behaviour as a Postgres transaction.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_on: Mutex<Option<FailPoint>>,
    reward_inserts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn add_business(&self, business: Business) {
        self.state.lock().unwrap().businesses.insert(business.id, business);
    }

    pub fn add_campaign(&self, campaign: Campaign) {
        self.state.lock().unwrap().campaigns.insert(campaign.id, campaign);
    }

    pub fn add_customer(&self, customer: Customer) {
        self.state.lock().unwrap().customers.insert(customer.id, customer);
    }

    pub fn put_reward(&self, reward: Reward) {
        self.state.lock().unwrap().rewards.insert(reward.id, reward);
    }

    pub fn campaign(&self, id: Uuid) -> Campaign {
        self.state.lock().unwrap().campaigns[&id].clone()
    }

    pub fn customer(&self, id: Uuid) -> Customer {
        self.state.lock().unwrap().customers[&id].clone()
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.state.lock().unwrap().customers.values().cloned().collect()
    }

    pub fn referral(&self, id: Uuid) -> Referral {
        self.state.lock().unwrap().referrals[&id].clone()
    }

    pub fn referrals(&self) -> Vec<Referral> {
        self.state.lock().unwrap().referrals.values().cloned().collect()
    }

    pub fn rewards(&self) -> Vec<Reward> {
        self.state.lock().unwrap().rewards.values().cloned().collect()
    }

    pub fn update_campaign(&self, id: Uuid, edit: impl FnOnce(&mut Campaign)) {
        let mut state = self.state.lock().unwrap();
        if let Some(campaign) = state.campaigns.get_mut(&id) {
            edit(campaign);
        }
    }

    pub fn update_referral(&self, id: Uuid, edit: impl FnOnce(&mut Referral)) {
        let mut state = self.state.lock().unwrap();
        if let Some(referral) = state.referrals.get_mut(&id) {
            edit(referral);
        }
    }

    /// Number of reward rows actually written (not counting idempotent hits).
    pub fn reward_inserts(&self) -> usize {
        self.reward_inserts.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, point: FailPoint) {
        *self.fail_on.lock().unwrap() = Some(point);
    }

    fn trip(&self, point: FailPoint) -> Result<(), StoreError> {
        let mut fail_on = self.fail_on.lock().unwrap();
        if *fail_on == Some(point) {
            *fail_on = None;
            return Err(StoreError::Backend(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    fn write<T>(&self, f: impl FnOnce(&mut State) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut guard = self.state.lock().unwrap();
        let mut staged = guard.clone();
        let out = f(&mut staged)?;
        *guard = staged;
        Ok(out)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn load_business(&self, business_id: Uuid) -> Result<Option<Business>, StoreError> {
        Ok(self.read(|s| s.businesses.get(&business_id).cloned()))
    }

    async fn load_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>, StoreError> {
        Ok(self.read(|s| s.campaigns.get(&campaign_id).cloned()))
    }

    async fn load_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, StoreError> {
        Ok(self.read(|s| s.customers.get(&customer_id).cloned()))
    }

    async fn find_customer_by_email(
        &self,
        business_id: Uuid,
        email: &str,
    ) -> Result<Option<Customer>, StoreError> {
        Ok(self.read(|s| {
            s.customers
                .values()
                .find(|c| c.business_id == business_id && c.email_matches(email))
                .cloned()
        }))
    }

    async fn load_referral(&self, referral_id: Uuid) -> Result<Option<Referral>, StoreError> {
        Ok(self.read(|s| s.referrals.get(&referral_id).cloned()))
    }

    async fn find_referral_by_code(&self, code: &str) -> Result<Option<Referral>, StoreError> {
        let code = code.trim().to_uppercase();
        Ok(self.read(|s| s.referrals.values().find(|r| r.referral_code == code).cloned()))
    }

    async fn find_latest_campaign_referral(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<Referral>, StoreError> {
        Ok(self.read(|s| {
            s.referrals
                .values()
                .filter(|r| r.campaign_id == campaign_id)
                .max_by_key(|r| r.created_at)
                .cloned()
        }))
    }

    async fn find_open_referral(
        &self,
        campaign_id: Uuid,
        referrer_id: Uuid,
        referee_email: &str,
    ) -> Result<Option<Referral>, StoreError> {
        Ok(self.read(|s| {
            s.referrals
                .values()
                .filter(|r| {
                    r.campaign_id == campaign_id
                        && r.referrer_id == referrer_id
                        && r.status.is_open()
                        && r.referee.contact().email.eq_ignore_ascii_case(referee_email.trim())
                })
                .max_by_key(|r| r.created_at)
                .cloned()
        }))
    }

    async fn list_stale_referrals(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Referral>, StoreError> {
        Ok(self.read(|s| {
            let mut stale: Vec<Referral> = s
                .referrals
                .values()
                .filter(|r| r.status.is_open() && r.expires_at < now)
                .cloned()
                .collect();
            stale.sort_by_key(|r| r.expires_at);
            stale.truncate(limit.max(0) as usize);
            stale
        }))
    }

    async fn load_reward(&self, reward_id: Uuid) -> Result<Option<Reward>, StoreError> {
        Ok(self.read(|s| s.rewards.get(&reward_id).cloned()))
    }

    async fn find_reward_for(
        &self,
        referral_id: Uuid,
        recipient: RecipientType,
    ) -> Result<Option<Reward>, StoreError> {
        Ok(self.read(|s| {
            s.rewards
                .values()
                .find(|r| r.referral_id == referral_id && r.recipient_type == recipient)
                .cloned()
        }))
    }

    async fn find_reward_by_code(
        &self,
        business_id: Uuid,
        code: &str,
    ) -> Result<Option<Reward>, StoreError> {
        let code = code.trim().to_uppercase();
        Ok(self.read(|s| {
            s.rewards
                .values()
                .find(|r| r.business_id == business_id && r.code == code)
                .cloned()
        }))
    }

    async fn list_stale_rewards(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Reward>, StoreError> {
        Ok(self.read(|s| {
            let mut stale: Vec<Reward> = s
                .rewards
                .values()
                .filter(|r| r.status == RewardStatus::Issued && r.expires_at < now)
                .cloned()
                .collect();
            stale.sort_by_key(|r| r.expires_at);
            stale.truncate(limit.max(0) as usize);
            stale
        }))
    }

    async fn insert_referral(&self, draft: ReferralDraft) -> Result<Referral, StoreError> {
        self.trip(FailPoint::InsertReferral)?;
        self.write(|s| {
            if s.referrals.values().any(|r| r.referral_code == draft.referral_code) {
                return Err(StoreError::DuplicateReferralCode(draft.referral_code));
            }
            draft.campaign_delta.apply(&mut s.campaign_mut(draft.campaign_id)?.statistics);
            draft.referrer_delta.apply(&mut s.customer_mut(draft.referrer_id)?.referral_stats);
            let referral = draft.into_referral();
            s.referrals.insert(referral.id, referral.clone());
            Ok(referral)
        })
    }

    async fn record_click(&self, click: ClickUpdate) -> Result<Referral, StoreError> {
        self.trip(FailPoint::RecordClick)?;
        self.write(|s| {
            let referral = s
                .referrals
                .get_mut(&click.referral_id)
                .filter(|r| r.status == click.expected_status)
                .ok_or(StoreError::Stale {
                    entity: "Referral",
                    id: click.referral_id,
                })?;
            referral.status = click.new_status;
            referral.click_count += 1;
            referral.last_clicked_at = Some(click.clicked_at);
            referral.updated_at = click.clicked_at;
            let referral = referral.clone();

            click.campaign_delta.apply(&mut s.campaign_mut(referral.campaign_id)?.statistics);
            Ok(referral)
        })
    }

    async fn commit_transition(&self, unit: TransitionUnit) -> Result<TransitionOutcome, StoreError> {
        let fail_rewards = {
            let fail_on = self.fail_on.lock().unwrap();
            *fail_on == Some(FailPoint::TransitionRewards)
        };

        let (outcome, written) = self.write(|s| {
            let referral = s
                .referrals
                .get_mut(&unit.referral_id)
                .filter(|r| r.status == unit.expected_status)
                .ok_or(StoreError::Stale {
                    entity: "Referral",
                    id: unit.referral_id,
                })?;
            referral.status = unit.new_status;
            referral.updated_at = unit.at;
            if let Some(conversion) = &unit.conversion {
                let details = referral.conversion_details.get_or_insert_with(Default::default);
                details.converted_at = conversion.converted_at.or(details.converted_at);
                details.conversion_type = conversion.conversion_type.clone().or(details.conversion_type.take());
                details.conversion_value = conversion.conversion_value.or(details.conversion_value);
                details.notes = conversion.notes.clone().or(details.notes.take());
            }
            let (campaign_id, referrer_id) = (referral.campaign_id, referral.referrer_id);

            let referee_id = match &unit.referee {
                RefereeLink::Keep => None,
                RefereeLink::Existing(id) => Some(*id),
                RefereeLink::Create(draft) => {
                    let duplicate = draft.email.as_deref().map_or(false, |email| {
                        s.customers
                            .values()
                            .any(|c| c.business_id == draft.business_id && c.email_matches(email))
                    });
                    if duplicate {
                        return Err(StoreError::DuplicateCustomerEmail(
                            draft.email.clone().unwrap_or_default(),
                        ));
                    }
                    let customer = draft.clone().into_customer();
                    s.customers.insert(customer.id, customer);
                    Some(draft.id)
                }
            };

            let referee = match referee_id {
                Some(customer_id) => {
                    if let Some(referral) = s.referrals.get_mut(&unit.referral_id) {
                        referral.referee = referral.referee.clone().link(customer_id);
                    }
                    s.customers.get(&customer_id).cloned()
                }
                None => None,
            };

            unit.campaign_delta.apply(&mut s.campaign_mut(campaign_id)?.statistics);
            unit.referrer_delta.apply(&mut s.customer_mut(referrer_id)?.referral_stats);

            if fail_rewards {
                return Err(StoreError::Backend("injected failure at TransitionRewards".into()));
            }

            let before = s.rewards.len();
            let mut rewards = Vec::with_capacity(unit.rewards.len());
            for draft in unit.rewards.iter().cloned() {
                rewards.push(s.insert_reward(draft)?);
            }
            let written = s.rewards.len() - before;

            let referral = s.referrals[&unit.referral_id].clone();
            Ok((
                TransitionOutcome {
                    referral,
                    referee,
                    rewards,
                },
                written,
            ))
        }).map_err(|e| {
            if fail_rewards {
                *self.fail_on.lock().unwrap() = None;
            }
            e
        })?;

        self.reward_inserts.fetch_add(written, Ordering::SeqCst);
        Ok(outcome)
    }

    async fn update_reward_status(&self, update: RewardStatusUpdate) -> Result<Reward, StoreError> {
        self.trip(FailPoint::UpdateReward)?;
        self.write(|s| {
            let reward = s
                .rewards
                .get_mut(&update.reward_id)
                .filter(|r| r.status == update.expected_status)
                .ok_or(StoreError::Stale {
                    entity: "Reward",
                    id: update.reward_id,
                })?;
            reward.status = update.new_status;
            reward.updated_at = update.at;
            reward.issued_at = update.issued_at.or(reward.issued_at);
            reward.claimed_at = update.claimed_at.or(reward.claimed_at);
            if let Some(method) = update.claim_method {
                reward.claim_method = method;
            }
            if let Some(details) = update.claim_details {
                reward.claim_details = Some(Json(details));
            }
            Ok(reward.clone())
        })
    }

    async fn append_follow_up(
        &self,
        referral_id: Uuid,
        follow_up: FollowUp,
    ) -> Result<Referral, StoreError> {
        self.write(|s| {
            let referral = s
                .referrals
                .get_mut(&referral_id)
                .ok_or_else(|| StoreError::Missing(format!("Referral {}", referral_id)))?;
            referral.follow_ups.push(follow_up);
            Ok(referral.clone())
        })
    }

    async fn append_reward_notification(
        &self,
        reward_id: Uuid,
        record: NotificationRecord,
    ) -> Result<Reward, StoreError> {
        self.write(|s| {
            let reward = s
                .rewards
                .get_mut(&reward_id)
                .ok_or_else(|| StoreError::Missing(format!("Reward {}", reward_id)))?;
            reward.notifications_sent.0.push(record);
            Ok(reward.clone())
        })
    }
}
