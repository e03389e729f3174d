// Referral state machine and the counter deltas each move implies.
use serde::Serialize;

use crate::models::{
    campaignmodel::CampaignStatistics,
    customermodel::ReferralStats,
    referralmodel::ReferralStatus::{self, *},
};

use super::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Both rewards are written in the same transaction as the move.
    IssueRewards,
    /// The referrer's reward is counted towards the campaign totals.
    SettleRewards,
}

const TRANSITIONS: &[(ReferralStatus, ReferralStatus, Effect)] = &[
    (Pending, Clicked, Effect::None),
    (Pending, Converted, Effect::IssueRewards),
    (Pending, Expired, Effect::None),
    (Pending, Rejected, Effect::None),
    (Clicked, Converted, Effect::IssueRewards),
    (Clicked, Expired, Effect::None),
    (Clicked, Rejected, Effect::None),
    (Converted, Rewarded, Effect::SettleRewards),
];

pub fn effect_of(from: ReferralStatus, to: ReferralStatus) -> Option<Effect> {
    TRANSITIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, effect)| *effect)
}

pub fn is_legal(from: ReferralStatus, to: ReferralStatus) -> bool {
    effect_of(from, to).is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CampaignBucket {
    Pending,
    Clicked,
    Successful,
}

fn campaign_bucket(status: ReferralStatus) -> Option<CampaignBucket> {
    match status {
        Pending => Some(CampaignBucket::Pending),
        Clicked => Some(CampaignBucket::Clicked),
        Converted | Rewarded => Some(CampaignBucket::Successful),
        Expired | Rejected => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CustomerBucket {
    Pending,
    Successful,
}

// Customers carry no clicked counter; a clicked referral is still pending for them.
fn customer_bucket(status: ReferralStatus) -> Option<CustomerBucket> {
    match status {
        Pending | Clicked => Some(CustomerBucket::Pending),
        Converted | Rewarded => Some(CustomerBucket::Successful),
        Expired | Rejected => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CampaignDelta {
    pub total_referrals: i64,
    pub pending_referrals: i64,
    pub clicked_referrals: i64,
    pub successful_referrals: i64,
    pub total_rewards: i64,
    pub total_rewards_value: f64,
}

impl CampaignDelta {
    pub fn created() -> Self {
        CampaignDelta {
            total_referrals: 1,
            pending_referrals: 1,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == CampaignDelta::default()
    }

    fn shift(&mut self, bucket: CampaignBucket, by: i64) {
        match bucket {
            CampaignBucket::Pending => self.pending_referrals += by,
            CampaignBucket::Clicked => self.clicked_referrals += by,
            CampaignBucket::Successful => self.successful_referrals += by,
        }
    }

    /// Same arithmetic as the SQL update: add, then clamp at zero.
    pub fn apply(&self, stats: &mut CampaignStatistics) {
        stats.total_referrals = (stats.total_referrals + self.total_referrals).max(0);
        stats.pending_referrals = (stats.pending_referrals + self.pending_referrals).max(0);
        stats.clicked_referrals = (stats.clicked_referrals + self.clicked_referrals).max(0);
        stats.successful_referrals = (stats.successful_referrals + self.successful_referrals).max(0);
        stats.total_rewards = (stats.total_rewards + self.total_rewards).max(0);
        stats.total_rewards_value = (stats.total_rewards_value + self.total_rewards_value).max(0.0);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CustomerDelta {
    pub total_referrals: i64,
    pub pending_referrals: i64,
    pub successful_referrals: i64,
    pub total_rewards_earned: i64,
}

impl CustomerDelta {
    pub fn created() -> Self {
        CustomerDelta {
            total_referrals: 1,
            pending_referrals: 1,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == CustomerDelta::default()
    }

    fn shift(&mut self, bucket: CustomerBucket, by: i64) {
        match bucket {
            CustomerBucket::Pending => self.pending_referrals += by,
            CustomerBucket::Successful => self.successful_referrals += by,
        }
    }

    pub fn apply(&self, stats: &mut ReferralStats) {
        stats.total_referrals = (stats.total_referrals + self.total_referrals).max(0);
        stats.pending_referrals = (stats.pending_referrals + self.pending_referrals).max(0);
        stats.successful_referrals = (stats.successful_referrals + self.successful_referrals).max(0);
        stats.total_rewards_earned = (stats.total_rewards_earned + self.total_rewards_earned).max(0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionPlan {
    pub from: ReferralStatus,
    pub to: ReferralStatus,
    pub effect: Effect,
    pub campaign: CampaignDelta,
    pub referrer: CustomerDelta,
}

impl TransitionPlan {
    /// Adds the referrer's reward value to the campaign totals of a settling move.
    pub fn with_settled_value(mut self, value: f64) -> Self {
        if self.effect == Effect::SettleRewards {
            self.campaign.total_rewards_value += value;
        }
        self
    }
}

pub fn plan(from: ReferralStatus, to: ReferralStatus) -> Result<TransitionPlan, ServiceError> {
    let effect = effect_of(from, to).ok_or_else(|| ServiceError::referral_transition(from, to))?;

    let mut campaign = CampaignDelta::default();
    if let Some(bucket) = campaign_bucket(from) {
        campaign.shift(bucket, -1);
    }
    if let Some(bucket) = campaign_bucket(to) {
        campaign.shift(bucket, 1);
    }

    let mut referrer = CustomerDelta::default();
    if let Some(bucket) = customer_bucket(from) {
        referrer.shift(bucket, -1);
    }
    if let Some(bucket) = customer_bucket(to) {
        referrer.shift(bucket, 1);
    }

    if effect == Effect::SettleRewards {
        campaign.total_rewards += 1;
        referrer.total_rewards_earned += 1;
    }

    Ok(TransitionPlan {
        from,
        to,
        effect,
        campaign,
        referrer,
    })
}
