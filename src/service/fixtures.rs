// Shared wiring for the ledger and reward tests.
use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::{
    clock::FixedClock,
    notification_service::{FailingGateway, NotificationGateway, NotificationService, RecordingGateway},
    referral::ScriptedCodes,
    referral_ledger::{NewReferral, ReferralLedger},
    reward_service::RewardService,
};
use crate::{
    db::memory::MemoryStore,
    models::{
        businessmodel::{Business, BusinessSettings},
        campaignmodel::{Campaign, CampaignStatistics, CampaignStatus, ConversionCriteria, RewardKind, RewardRule},
        customermodel::{Customer, CustomerPreferences, CustomerSource, ReferralStats},
        referralmodel::{RefereeContact, Referral, ReferralStatus, SharingMethod},
        rewardmodel::{RecipientType, Reward},
    },
};

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub fn business(id: Uuid) -> Business {
    Business {
        id,
        user_id: Uuid::new_v4(),
        business_name: "Joe's Pizza".to_string(),
        description: None,
        industry: Some("food".to_string()),
        website: None,
        contact_email: Some("joe@pizza.example".to_string()),
        contact_phone: None,
        settings: BusinessSettings::default(),
        active: true,
        created_at: start(),
        updated_at: start(),
    }
}

pub fn campaign(id: Uuid, business_id: Uuid) -> Campaign {
    Campaign {
        id,
        business_id,
        name: "Spring Friends".to_string(),
        description: None,
        referrer_reward: RewardRule {
            kind: RewardKind::Fixed,
            value: 10.0,
            description: Some("$10 off".to_string()),
        },
        referee_reward: RewardRule {
            kind: RewardKind::Percentage,
            value: 15.0,
            description: Some("15% off first order".to_string()),
        },
        status: CampaignStatus::Active,
        active: true,
        start_date: start() - Duration::days(1),
        end_date: None,
        referral_expiration_days: Some(30),
        conversion_criteria: ConversionCriteria::Form,
        email_subject: None,
        email_body: None,
        statistics: CampaignStatistics::default(),
        created_at: start(),
        updated_at: start(),
    }
}

pub fn customer(business_id: Uuid, name: &str, email: &str) -> Customer {
    Customer {
        id: Uuid::new_v4(),
        business_id,
        user_id: None,
        name: name.to_string(),
        email: Some(email.to_string()),
        phone: None,
        source: CustomerSource::Direct,
        referred_by: None,
        referral_campaign: None,
        tags: Vec::new(),
        notes: None,
        referral_stats: ReferralStats::default(),
        preferences: CustomerPreferences::default(),
        active: true,
        created_at: start(),
        updated_at: start(),
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub codes: Arc<ScriptedCodes>,
    pub gateway: Arc<RecordingGateway>,
    pub rewards: Arc<RewardService>,
    pub ledger: ReferralLedger,
    pub business_id: Uuid,
    pub campaign_id: Uuid,
    pub referrer_id: Uuid,
}

impl Harness {
    pub fn new() -> Self {
        let gateway = Arc::new(RecordingGateway::default());
        Self::build(gateway.clone(), gateway)
    }

    pub fn with_failing_gateway() -> Self {
        Self::build(Arc::new(FailingGateway), Arc::new(RecordingGateway::default()))
    }

    fn build(transport: Arc<dyn NotificationGateway>, gateway: Arc<RecordingGateway>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::at(start()));
        let codes = Arc::new(ScriptedCodes::default());
        let notifications = NotificationService::new(transport, StdDuration::from_secs(1));

        let business_id = Uuid::new_v4();
        let campaign_id = Uuid::new_v4();
        let referrer = customer(business_id, "Alice", "alice@example.com");
        let referrer_id = referrer.id;

        store.add_business(business(business_id));
        store.add_campaign(campaign(campaign_id, business_id));
        store.add_customer(referrer);

        let rewards = Arc::new(RewardService::new(
            store.clone(),
            clock.clone(),
            codes.clone(),
            notifications.clone(),
            90,
        ));
        let ledger = ReferralLedger::new(
            store.clone(),
            rewards.clone(),
            notifications,
            clock.clone(),
            codes.clone(),
            "https://app.example.com",
        );

        Harness {
            store,
            clock,
            codes,
            gateway,
            rewards,
            ledger,
            business_id,
            campaign_id,
            referrer_id,
        }
    }

    pub fn invite(&self, name: &str, email: &str) -> NewReferral {
        NewReferral {
            campaign_id: self.campaign_id,
            referrer_id: self.referrer_id,
            referee: RefereeContact {
                name: name.to_string(),
                email: email.to_string(),
                phone: None,
            },
            sharing_method: SharingMethod::Email,
            notes: None,
        }
    }

    pub async fn pending_referral(&self) -> Referral {
        self.ledger
            .create_referral(self.business_id, self.invite("Bob", "bob@example.com"))
            .await
            .unwrap()
            .referral
    }

    pub async fn converted_referral(&self) -> Referral {
        let referral = self.pending_referral().await;
        self.ledger
            .transition_status(self.business_id, referral.id, ReferralStatus::Converted, None)
            .await
            .unwrap()
            .referral
    }

    pub fn reward_of(&self, referral_id: Uuid, recipient: RecipientType) -> Reward {
        self.store
            .rewards()
            .into_iter()
            .find(|r| r.referral_id == referral_id && r.recipient_type == recipient)
            .unwrap()
    }

    pub fn stats(&self) -> CampaignStatistics {
        self.store.campaign(self.campaign_id).statistics
    }

    pub fn referrer_stats(&self) -> ReferralStats {
        self.store.customer(self.referrer_id).referral_stats
    }
}

/// Stand-alone reward row for tests that do not need a referral behind it.
pub fn issued_reward(business_id: Uuid, recipient_id: Uuid, code: &str, expires_at: DateTime<Utc>) -> Reward {
    Reward {
        id: Uuid::new_v4(),
        business_id,
        campaign_id: Uuid::new_v4(),
        referral_id: Uuid::new_v4(),
        recipient_id,
        recipient_type: RecipientType::Referrer,
        reward_type: RewardKind::Fixed,
        value: 10.0,
        description: None,
        code: code.to_string(),
        status: crate::models::rewardmodel::RewardStatus::Issued,
        issued_at: Some(start()),
        claimed_at: None,
        expires_at,
        claim_method: Default::default(),
        claim_details: None,
        notifications_sent: Json(Vec::new()),
        created_at: start(),
        updated_at: start(),
    }
}
