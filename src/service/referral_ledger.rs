use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{
    clock::Clock,
    error::ServiceError,
    notification_service::{Address, NotificationService},
    referral::{generate_referral_link, shareable_links, CodeGenerator, ShareableLinks},
    reward_service::RewardService,
    transitions::{self, CampaignDelta, CustomerDelta, Effect},
};
use crate::{
    db::{
        ClickUpdate, LedgerStore, RefereeLink, ReferralDraft, StoreError, TransitionOutcome,
        TransitionUnit,
    },
    mail::mails,
    models::{
        businessmodel::Business,
        campaignmodel::Campaign,
        customermodel::{Customer, CustomerDraft, CustomerPreferences, CustomerSource},
        referralmodel::{
            ConversionDetails, FollowUp, FollowUpMethod, FollowUpStatus, Referee, RefereeContact,
            Referral, ReferralStatus, SharingMethod,
        },
        rewardmodel::{RecipientType, Reward, RewardStatus},
    },
    utils::phone::normalize_phone,
};

const MAX_CODE_ATTEMPTS: usize = 5;
const MAX_STALE_RETRIES: usize = 3;
const SWEEP_BATCH: i64 = 500;

#[derive(Debug, Clone)]
pub struct NewReferral {
    pub campaign_id: Uuid,
    pub referrer_id: Uuid,
    pub referee: RefereeContact,
    pub sharing_method: SharingMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedReferral {
    pub referral: Referral,
    pub shareable_links: ShareableLinks,
}

/// Customer data supplied when a referee becomes a customer. Missing name,
/// email or phone fall back to the referral's contact snapshot.
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub preferences: Option<CustomerPreferences>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub customer: Customer,
    pub referral: Referral,
    pub rewards: Vec<Reward>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub referrals_expired: usize,
    pub rewards_expired: usize,
}

/// Sole writer of referral status and of the campaign and customer counters.
pub struct ReferralLedger {
    store: Arc<dyn LedgerStore>,
    rewards: Arc<RewardService>,
    notifications: NotificationService,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn CodeGenerator>,
    app_url: String,
}

fn normalized_phone(phone: Option<&str>) -> Result<Option<String>, ServiceError> {
    match phone.map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => normalize_phone(raw).map(Some).map_err(ServiceError::Validation),
        None => Ok(None),
    }
}

fn validate_contact(contact: &RefereeContact) -> Result<RefereeContact, ServiceError> {
    let name = contact.name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("Referee name is required".to_string()));
    }
    let email = contact.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ServiceError::Validation("Referee email is invalid".to_string()));
    }

    Ok(RefereeContact {
        name: name.to_string(),
        email,
        phone: normalized_phone(contact.phone.as_deref())?,
    })
}

impl ReferralLedger {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        rewards: Arc<RewardService>,
        notifications: NotificationService,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeGenerator>,
        app_url: impl Into<String>,
    ) -> Self {
        ReferralLedger {
            store,
            rewards,
            notifications,
            clock,
            codes,
            app_url: app_url.into(),
        }
    }

    async fn business(&self, business_id: Uuid) -> Result<Business, ServiceError> {
        self.store
            .load_business(business_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Business profile not found"))
    }

    async fn campaign_in(&self, business_id: Uuid, campaign_id: Uuid) -> Result<Campaign, ServiceError> {
        self.store
            .load_campaign(campaign_id)
            .await?
            .filter(|c| c.business_id == business_id)
            .ok_or_else(|| ServiceError::not_found("Campaign not found"))
    }

    async fn referrer_in(&self, business_id: Uuid, customer_id: Uuid) -> Result<Customer, ServiceError> {
        self.store
            .load_customer(customer_id)
            .await?
            .filter(|c| c.business_id == business_id)
            .ok_or_else(|| ServiceError::not_found("Referrer not found"))
    }

    async fn referral_in(&self, business_id: Uuid, referral_id: Uuid) -> Result<Referral, ServiceError> {
        self.store
            .load_referral(referral_id)
            .await?
            .filter(|r| r.business_id == business_id)
            .ok_or_else(|| ServiceError::not_found("Referral not found"))
    }

    async fn reload(&self, referral_id: Uuid) -> Result<Referral, ServiceError> {
        self.store
            .load_referral(referral_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Referral not found"))
    }

    pub async fn create_referral(
        &self,
        business_id: Uuid,
        input: NewReferral,
    ) -> Result<CreatedReferral, ServiceError> {
        let contact = validate_contact(&input.referee)?;
        let business = self.business(business_id).await?;
        let campaign = self.campaign_in(business_id, input.campaign_id).await?;
        if !campaign.accepts_referrals(self.clock.now()) {
            return Err(ServiceError::Validation(
                "Campaign is not accepting referrals".to_string(),
            ));
        }
        let referrer = self.referrer_in(business_id, input.referrer_id).await?;
        if !referrer.active {
            return Err(ServiceError::Validation("Referrer is not active".to_string()));
        }

        self.open_referral(
            &business,
            &campaign,
            &referrer,
            contact,
            input.sharing_method,
            input.notes,
        )
        .await
    }

    /// Inserts a pending referral once tenancy and input were checked.
    async fn open_referral(
        &self,
        business: &Business,
        campaign: &Campaign,
        referrer: &Customer,
        contact: RefereeContact,
        sharing_method: SharingMethod,
        notes: Option<String>,
    ) -> Result<CreatedReferral, ServiceError> {
        if referrer.email_matches(&contact.email) {
            return Err(ServiceError::Validation(
                "A customer cannot refer themselves".to_string(),
            ));
        }

        let referee = match self
            .store
            .find_customer_by_email(business.id, &contact.email)
            .await?
        {
            Some(existing) => Referee::Linked {
                customer_id: existing.id,
                contact: contact.clone(),
            },
            None => Referee::Anonymous {
                contact: contact.clone(),
            },
        };

        let expiration_days = campaign
            .referral_expiration_days
            .filter(|days| *days > 0)
            .map(i64::from)
            .unwrap_or_else(|| business.referral_expiration_days());

        let mut attempts = 0;
        let referral = loop {
            attempts += 1;
            let now = self.clock.now();
            let code = self.codes.referral_code();
            let draft = ReferralDraft {
                id: Uuid::new_v4(),
                campaign_id: campaign.id,
                business_id: business.id,
                referrer_id: referrer.id,
                referee: referee.clone(),
                referral_link: generate_referral_link(&self.app_url, &code),
                referral_code: code,
                sharing_method,
                expires_at: now + Duration::days(expiration_days),
                notes: notes.clone(),
                created_at: now,
                campaign_delta: CampaignDelta::created(),
                referrer_delta: CustomerDelta::created(),
            };

            match self.store.insert_referral(draft).await {
                Ok(referral) => break referral,
                Err(StoreError::DuplicateReferralCode(code)) if attempts < MAX_CODE_ATTEMPTS => {
                    tracing::warn!("referral code {} collided, generating another", code);
                }
                Err(e) => return Err(e.into()),
            }
        };

        tracing::info!(
            "referral {} created for campaign {} by customer {}",
            referral.referral_code,
            campaign.id,
            referrer.id
        );

        if business.settings.email_notifications {
            let invite = mails::referral_invite(
                campaign,
                &business.business_name,
                &referrer.name,
                &contact.name,
                &referral.referral_link,
            );
            self.notifications.dispatch(Address::Email(contact.email), invite);
        }

        Ok(CreatedReferral {
            shareable_links: shareable_links(&referral.referral_link, &business.business_name),
            referral,
        })
    }

    /// Resolves a public locator: a referral id, a campaign id (latest
    /// referral of that campaign) or a referral code.
    async fn locate(&self, locator: &str) -> Result<Option<Referral>, ServiceError> {
        let locator = locator.trim();
        if let Ok(id) = Uuid::parse_str(locator) {
            if let Some(referral) = self.store.load_referral(id).await? {
                return Ok(Some(referral));
            }
            return Ok(self.store.find_latest_campaign_referral(id).await?);
        }
        Ok(self.store.find_referral_by_code(locator).await?)
    }

    pub async fn track_click(&self, locator: &str) -> Result<Referral, ServiceError> {
        let mut referral = self
            .locate(locator)
            .await?
            .ok_or_else(|| ServiceError::not_found("Referral not found"))?;

        let mut retries = 0;
        loop {
            let now = self.clock.now();
            if referral.status == ReferralStatus::Expired || referral.is_past_expiry(now) {
                return Err(ServiceError::not_found("Referral has expired"));
            }

            let (new_status, campaign_delta) = if referral.status == ReferralStatus::Pending {
                let plan = transitions::plan(ReferralStatus::Pending, ReferralStatus::Clicked)?;
                (ReferralStatus::Clicked, plan.campaign)
            } else {
                (referral.status, CampaignDelta::default())
            };

            let click = ClickUpdate {
                referral_id: referral.id,
                expected_status: referral.status,
                new_status,
                clicked_at: now,
                campaign_delta,
            };

            match self.store.record_click(click).await {
                Ok(updated) => {
                    tracing::debug!(
                        "click on referral {} (count {})",
                        updated.referral_code,
                        updated.click_count
                    );
                    return Ok(updated);
                }
                Err(StoreError::Stale { .. }) if retries < MAX_STALE_RETRIES => {
                    retries += 1;
                    referral = self.reload(referral.id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Links the referee to an existing customer or prepares a new one.
    async fn resolve_referee(
        &self,
        referral: &Referral,
        customer: Option<&NewCustomer>,
        now: DateTime<Utc>,
    ) -> Result<(RefereeLink, Uuid), ServiceError> {
        if let Some(customer_id) = referral.referee.customer_id() {
            return Ok((RefereeLink::Existing(customer_id), customer_id));
        }

        let contact = referral.referee.contact();
        let input = customer.cloned().unwrap_or_default();
        let email = input
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| contact.email.clone());

        if let Some(existing) = self
            .store
            .find_customer_by_email(referral.business_id, &email)
            .await?
        {
            return Ok((RefereeLink::Existing(existing.id), existing.id));
        }

        let name = input
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| contact.name.clone());
        let phone = match input.phone {
            Some(phone) => normalized_phone(Some(phone.as_str()))?,
            None => contact.phone.clone(),
        };

        let draft = CustomerDraft {
            id: Uuid::new_v4(),
            business_id: referral.business_id,
            user_id: input.user_id,
            name,
            email: Some(email),
            phone,
            source: CustomerSource::Referral,
            referred_by: Some(referral.referrer_id),
            referral_campaign: Some(referral.campaign_id),
            tags: input.tags,
            notes: input.notes,
            preferences: input.preferences.unwrap_or_default(),
            created_at: now,
        };
        let id = draft.id;
        Ok((RefereeLink::Create(draft), id))
    }

    /// Applies one legal move with its counter deltas and, for conversions,
    /// the referee link and both rewards, as a single store write.
    async fn run_transition(
        &self,
        mut referral: Referral,
        to: ReferralStatus,
        details: Option<ConversionDetails>,
        customer: Option<&NewCustomer>,
    ) -> Result<TransitionOutcome, ServiceError> {
        let mut stale_retries = 0;
        let mut code_attempts = 0;

        loop {
            let plan = transitions::plan(referral.status, to)?;
            let now = self.clock.now();
            let mut unit = TransitionUnit {
                referral_id: referral.id,
                expected_status: referral.status,
                new_status: to,
                at: now,
                conversion: None,
                referee: RefereeLink::Keep,
                campaign_delta: plan.campaign,
                referrer_delta: plan.referrer,
                rewards: Vec::new(),
            };

            match plan.effect {
                Effect::IssueRewards => {
                    let campaign = self
                        .store
                        .load_campaign(referral.campaign_id)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("Campaign not found"))?;
                    let (link, referee_id) = self.resolve_referee(&referral, customer, now).await?;
                    unit.referee = link;

                    let mut conversion = details.clone().unwrap_or_default();
                    conversion.converted_at = Some(conversion.converted_at.unwrap_or(now));
                    unit.conversion = Some(conversion);

                    unit.rewards = vec![
                        self.rewards.issue(
                            &referral,
                            &campaign,
                            RecipientType::Referrer,
                            referral.referrer_id,
                            now,
                        ),
                        self.rewards.issue(&referral, &campaign, RecipientType::Referee, referee_id, now),
                    ];
                }
                Effect::SettleRewards => {
                    let value = match self
                        .store
                        .find_reward_for(referral.id, RecipientType::Referrer)
                        .await?
                    {
                        Some(reward) => reward.value,
                        None => self
                            .store
                            .load_campaign(referral.campaign_id)
                            .await?
                            .map(|c| c.referrer_reward.value)
                            .unwrap_or_default(),
                    };
                    unit.campaign_delta = plan.with_settled_value(value).campaign;
                    unit.conversion = details.clone();
                }
                Effect::None => {}
            }

            match self.store.commit_transition(unit).await {
                Ok(outcome) => {
                    tracing::info!(
                        "referral {} moved from {} to {}",
                        outcome.referral.referral_code,
                        referral.status,
                        outcome.referral.status
                    );
                    return Ok(outcome);
                }
                Err(StoreError::Stale { .. }) if stale_retries < MAX_STALE_RETRIES => {
                    stale_retries += 1;
                    referral = self.reload(referral.id).await?;
                }
                // Another request created the referee first; linking wins on retry.
                Err(StoreError::DuplicateCustomerEmail(_))
                    if customer.is_none() && stale_retries < MAX_STALE_RETRIES =>
                {
                    stale_retries += 1;
                    referral = self.reload(referral.id).await?;
                }
                Err(StoreError::DuplicateRewardCode(code)) if code_attempts < MAX_CODE_ATTEMPTS => {
                    code_attempts += 1;
                    tracing::warn!("reward code {} collided, generating another", code);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn announce_rewards(&self, business_id: Uuid, rewards: &[Reward]) {
        let notify = match self.store.load_business(business_id).await {
            Ok(Some(business)) => business.settings.email_notifications,
            _ => false,
        };
        if notify {
            for reward in rewards.iter().filter(|r| r.status == RewardStatus::Issued) {
                self.rewards.notify_issued(reward);
            }
        }
    }

    pub async fn transition_status(
        &self,
        business_id: Uuid,
        referral_id: Uuid,
        new_status: ReferralStatus,
        details: Option<ConversionDetails>,
    ) -> Result<TransitionOutcome, ServiceError> {
        let referral = self.referral_in(business_id, referral_id).await?;
        let outcome = self.run_transition(referral, new_status, details, None).await?;

        if new_status == ReferralStatus::Converted {
            self.announce_rewards(business_id, &outcome.rewards).await;
        }
        Ok(outcome)
    }

    pub async fn convert_referee(
        &self,
        business_id: Uuid,
        referral_id: Uuid,
        customer: NewCustomer,
        details: Option<ConversionDetails>,
    ) -> Result<Conversion, ServiceError> {
        let referral = self.referral_in(business_id, referral_id).await?;
        self.convert(referral, customer, details).await
    }

    async fn convert(
        &self,
        referral: Referral,
        customer: NewCustomer,
        details: Option<ConversionDetails>,
    ) -> Result<Conversion, ServiceError> {
        if referral.referee.is_linked() {
            return Err(ServiceError::AlreadyConverted);
        }
        let business_id = referral.business_id;

        let outcome = self
            .run_transition(referral, ReferralStatus::Converted, details, Some(&customer))
            .await?;
        let customer = outcome
            .referee
            .ok_or_else(|| StoreError::Missing("Referee customer".to_string()))?;

        self.announce_rewards(business_id, &outcome.rewards).await;
        Ok(Conversion {
            customer,
            referral: outcome.referral,
            rewards: outcome.rewards,
        })
    }

    /// A business adds a customer together with the referral code they came with.
    pub async fn convert_by_code(
        &self,
        business_id: Uuid,
        code: &str,
        customer: NewCustomer,
    ) -> Result<Conversion, ServiceError> {
        let referral = self
            .store
            .find_referral_by_code(code)
            .await?
            .filter(|r| r.business_id == business_id)
            .ok_or_else(|| ServiceError::not_found("Invalid referral code"))?;

        if referral.status == ReferralStatus::Expired || referral.is_past_expiry(self.clock.now()) {
            return Err(ServiceError::Expired("Referral".to_string()));
        }

        // A new customer record only; an existing one is never attached here.
        if !referral.referee.is_linked() {
            let email = customer
                .email
                .as_deref()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| referral.referee.contact().email.clone());
            if self
                .store
                .find_customer_by_email(business_id, &email)
                .await?
                .is_some()
            {
                return Err(StoreError::DuplicateCustomerEmail(email).into());
            }
        }

        let details = ConversionDetails {
            conversion_type: Some("signup".to_string()),
            ..Default::default()
        };
        self.convert(referral, customer, Some(details)).await
    }

    /// Landing-page sign-up: reuses the referrer's open referral for this email
    /// or opens one, then converts it.
    pub async fn convert_public(
        &self,
        campaign_id: Uuid,
        referrer_id: Uuid,
        customer: NewCustomer,
    ) -> Result<Conversion, ServiceError> {
        let campaign = self
            .store
            .load_campaign(campaign_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Campaign not found"))?;
        if !campaign.accepts_referrals(self.clock.now()) {
            return Err(ServiceError::Validation(
                "Campaign is not accepting referrals".to_string(),
            ));
        }
        let referrer = self.referrer_in(campaign.business_id, referrer_id).await?;
        let business = self.business(campaign.business_id).await?;

        let contact = validate_contact(&RefereeContact {
            name: customer.name.clone().unwrap_or_default(),
            email: customer.email.clone().unwrap_or_default(),
            phone: customer.phone.clone(),
        })?;

        if self
            .store
            .find_customer_by_email(business.id, &contact.email)
            .await?
            .is_some()
        {
            return Err(ServiceError::Validation(
                "A customer with this email already exists".to_string(),
            ));
        }

        let now = self.clock.now();
        let open = self
            .store
            .find_open_referral(campaign.id, referrer.id, &contact.email)
            .await?
            .filter(|r| !r.is_past_expiry(now));

        let referral = match open {
            Some(referral) => referral,
            None => {
                self.open_referral(&business, &campaign, &referrer, contact, SharingMethod::Other, None)
                    .await?
                    .referral
            }
        };

        let details = ConversionDetails {
            conversion_type: Some("signup".to_string()),
            ..Default::default()
        };
        self.convert(referral, customer, Some(details)).await
    }

    pub async fn send_follow_up(
        &self,
        business_id: Uuid,
        referral_id: Uuid,
        method: FollowUpMethod,
        message: &str,
    ) -> Result<Referral, ServiceError> {
        let referral = self.referral_in(business_id, referral_id).await?;

        if matches!(referral.status, ReferralStatus::Expired | ReferralStatus::Rejected) {
            return Err(ServiceError::Validation(
                "Cannot follow up on an expired or rejected referral".to_string(),
            ));
        }
        let message = message.trim();
        if message.is_empty() {
            return Err(ServiceError::Validation("Follow-up message is required".to_string()));
        }

        let contact = referral.referee.contact();
        let address = match method {
            FollowUpMethod::Email => Address::Email(contact.email.clone()),
            FollowUpMethod::Sms => Address::Phone(contact.phone.clone().ok_or_else(|| {
                ServiceError::Validation("Referee does not have a phone number".to_string())
            })?),
            FollowUpMethod::Ai => {
                return Err(ServiceError::Validation(
                    "AI follow-ups are not supported".to_string(),
                ))
            }
        };

        let business = self.business(business_id).await?;
        let outgoing = mails::referral_follow_up(
            &business.business_name,
            &contact.name,
            message,
            &referral.referral_link,
        );

        let status = match self.notifications.send(&address, &outgoing).await {
            Ok(_) => FollowUpStatus::Sent,
            Err(_) => FollowUpStatus::Failed,
        };

        let follow_up = FollowUp {
            sent_at: self.clock.now(),
            method,
            message: message.to_string(),
            status,
        };
        Ok(self.store.append_follow_up(referral.id, follow_up).await?)
    }

    /// Expires overdue open referrals and issued rewards.
    pub async fn expire_stale(&self) -> Result<SweepReport, ServiceError> {
        let now = self.clock.now();
        let stale = self.store.list_stale_referrals(now, SWEEP_BATCH).await?;
        let mut report = SweepReport::default();

        for referral in stale {
            let code = referral.referral_code.clone();
            match self.run_transition(referral, ReferralStatus::Expired, None, None).await {
                Ok(_) => report.referrals_expired += 1,
                // Converted or rejected while the sweep was running.
                Err(ServiceError::InvalidTransition { .. }) => {
                    tracing::debug!("referral {} left the open states, skipping", code);
                }
                Err(e) => return Err(e),
            }
        }

        report.rewards_expired = self.rewards.expire_stale().await?;
        tracing::info!(
            "expiry sweep: {} referrals, {} rewards",
            report.referrals_expired,
            report.rewards_expired
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        db::memory::FailPoint,
        models::rewardmodel::{ClaimDetails, RewardStatus},
        service::fixtures::{self, Harness},
    };

    #[tokio::test]
    async fn alice_refers_bob_end_to_end() {
        let h = Harness::new();
        h.codes.queue_referral(&["BOB123"]);

        let created = h
            .ledger
            .create_referral(h.business_id, h.invite("Bob", "Bob@Example.com"))
            .await
            .unwrap();
        let referral = created.referral;
        assert_eq!(referral.referral_code, "BOB123");
        assert_eq!(referral.referral_link, "https://app.example.com/refer/BOB123");
        assert_eq!(referral.status, ReferralStatus::Pending);
        assert_eq!(referral.expires_at, fixtures::start() + Duration::days(30));
        assert_eq!(created.shareable_links.default, referral.referral_link);

        let stats = h.stats();
        assert_eq!((stats.total_referrals, stats.pending_referrals), (1, 1));
        assert_eq!(h.referrer_stats().pending_referrals, 1);

        let clicked = h.ledger.track_click("bob123").await.unwrap();
        assert_eq!(clicked.status, ReferralStatus::Clicked);
        assert_eq!((h.stats().pending_referrals, h.stats().clicked_referrals), (0, 1));

        let conversion = h
            .ledger
            .convert_referee(
                h.business_id,
                referral.id,
                NewCustomer {
                    phone: Some("555-123-4567".into()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(conversion.customer.name, "Bob");
        assert_eq!(conversion.customer.email.as_deref(), Some("bob@example.com"));
        assert_eq!(conversion.customer.phone.as_deref(), Some("+15551234567"));
        assert_eq!(conversion.customer.referred_by, Some(h.referrer_id));
        assert_eq!(conversion.referral.referee.customer_id(), Some(conversion.customer.id));
        assert_eq!(conversion.rewards.len(), 2);

        let stats = h.stats();
        assert_eq!((stats.clicked_referrals, stats.successful_referrals), (0, 1));
        let referrer = h.referrer_stats();
        assert_eq!((referrer.pending_referrals, referrer.successful_referrals), (0, 1));

        let referrer_reward = h.reward_of(referral.id, RecipientType::Referrer);
        assert_eq!(referrer_reward.recipient_id, h.referrer_id);
        assert_eq!(referrer_reward.value, 10.0);
        assert!(referrer_reward.code.starts_with('F'));
        let referee_reward = h.reward_of(referral.id, RecipientType::Referee);
        assert_eq!(referee_reward.recipient_id, conversion.customer.id);
        assert!(referee_reward.code.starts_with('P'));
        assert_eq!(referee_reward.expires_at, fixtures::start() + Duration::days(90));

        let rewarded = h
            .ledger
            .transition_status(h.business_id, referral.id, ReferralStatus::Rewarded, None)
            .await
            .unwrap();
        assert_eq!(rewarded.referral.status, ReferralStatus::Rewarded);
        let stats = h.stats();
        assert_eq!(stats.successful_referrals, 1);
        assert_eq!(stats.total_rewards, 1);
        assert_eq!(stats.total_rewards_value, 10.0);
        assert_eq!(h.referrer_stats().total_rewards_earned, 1);

        let claimed = h
            .rewards
            .claim(referee_reward.id, conversion.customer.id, ClaimDetails::default())
            .await
            .unwrap();
        assert_eq!(claimed.status, RewardStatus::Claimed);
    }

    #[tokio::test]
    async fn repeated_clicks_count_but_transition_once() {
        let h = Harness::new();
        let referral = h.pending_referral().await;

        for _ in 0..3 {
            h.ledger.track_click(&referral.referral_code).await.unwrap();
        }
        let clicked = h.ledger.track_click(&referral.id.to_string()).await.unwrap();

        assert_eq!(clicked.click_count, 4);
        assert_eq!(clicked.last_clicked_at, Some(fixtures::start()));
        let stats = h.stats();
        assert_eq!((stats.pending_referrals, stats.clicked_referrals), (0, 1));
    }

    #[tokio::test]
    async fn campaign_id_locates_latest_referral() {
        let h = Harness::new();
        h.pending_referral().await;
        h.clock.advance(Duration::minutes(5));
        let latest = h
            .ledger
            .create_referral(h.business_id, h.invite("Carol", "carol@example.com"))
            .await
            .unwrap()
            .referral;

        let clicked = h.ledger.track_click(&h.campaign_id.to_string()).await.unwrap();
        assert_eq!(clicked.id, latest.id);
    }

    #[tokio::test]
    async fn click_on_expired_referral_is_not_found() {
        let h = Harness::new();
        let referral = h.pending_referral().await;
        h.clock.advance(Duration::days(31));

        let err = h.ledger.track_click(&referral.referral_code).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let stored = h.store.referral(referral.id);
        assert_eq!(stored.status, ReferralStatus::Pending);
        assert_eq!(stored.click_count, 0);

        let err = h.ledger.track_click("NOPE00").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn illegal_moves_are_rejected_without_side_effects() {
        let h = Harness::new();
        let referral = h.converted_referral().await;
        h.ledger
            .transition_status(h.business_id, referral.id, ReferralStatus::Rewarded, None)
            .await
            .unwrap();
        let before = h.stats();

        for target in [ReferralStatus::Pending, ReferralStatus::Expired, ReferralStatus::Rewarded] {
            let err = h
                .ledger
                .transition_status(h.business_id, referral.id, target, None)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::InvalidTransition { .. }));
        }
        assert_eq!(h.stats(), before);
    }

    #[tokio::test]
    async fn converting_twice_keeps_one_reward_per_role() {
        let h = Harness::new();
        let referral = h.converted_referral().await;

        let err = h
            .ledger
            .transition_status(h.business_id, referral.id, ReferralStatus::Converted, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));

        let err = h
            .ledger
            .convert_referee(h.business_id, referral.id, NewCustomer::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyConverted));

        assert_eq!(h.store.rewards().len(), 2);
        assert_eq!(h.store.reward_inserts(), 2);
        assert_eq!(h.stats().successful_referrals, 1);
    }

    #[tokio::test]
    async fn existing_customer_is_linked_not_duplicated() {
        let h = Harness::new();
        let bob = fixtures::customer(h.business_id, "Bob B.", "bob@example.com");
        let bob_id = bob.id;
        h.store.add_customer(bob);

        let referral = h.pending_referral().await;
        assert_eq!(referral.referee.customer_id(), Some(bob_id));

        let outcome = h
            .ledger
            .transition_status(h.business_id, referral.id, ReferralStatus::Converted, None)
            .await
            .unwrap();
        assert_eq!(outcome.referee.map(|c| c.id), Some(bob_id));
        assert_eq!(h.store.customers().len(), 2);
        assert_eq!(h.reward_of(referral.id, RecipientType::Referee).recipient_id, bob_id);
    }

    #[tokio::test]
    async fn other_tenants_cannot_touch_referrals() {
        let h = Harness::new();
        let referral = h.pending_referral().await;

        let err = h
            .ledger
            .transition_status(Uuid::new_v4(), referral.id, ReferralStatus::Rejected, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let mut foreign = h.invite("Dan", "dan@example.com");
        foreign.referrer_id = fixtures::customer(Uuid::new_v4(), "Eve", "eve@example.com").id;
        let err = h.ledger.create_referral(h.business_id, foreign).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn paused_campaign_refuses_new_referrals() {
        let h = Harness::new();
        h.store.update_campaign(h.campaign_id, |c| {
            c.status = crate::models::campaignmodel::CampaignStatus::Paused
        });

        let err = h
            .ledger
            .create_referral(h.business_id, h.invite("Bob", "bob@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(h.stats().total_referrals, 0);
    }

    #[tokio::test]
    async fn failure_mid_conversion_leaves_nothing_behind() {
        let h = Harness::new();
        let referral = h.pending_referral().await;
        let before = h.stats();
        let referrer_before = h.referrer_stats();

        h.store.fail_next(FailPoint::TransitionRewards);
        let err = h
            .ledger
            .transition_status(h.business_id, referral.id, ReferralStatus::Converted, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));

        assert_eq!(h.store.referral(referral.id).status, ReferralStatus::Pending);
        assert!(!h.store.referral(referral.id).referee.is_linked());
        assert_eq!(h.stats(), before);
        assert_eq!(h.referrer_stats(), referrer_before);
        assert!(h.store.rewards().is_empty());
        assert_eq!(h.store.customers().len(), 1);

        // The same call succeeds once storage recovers.
        h.ledger
            .transition_status(h.business_id, referral.id, ReferralStatus::Converted, None)
            .await
            .unwrap();
        assert_eq!(h.store.rewards().len(), 2);
    }

    #[tokio::test]
    async fn colliding_codes_are_regenerated() {
        let h = Harness::new();
        h.codes.queue_referral(&["TAKEN1"]);
        let first = h.pending_referral().await;

        h.codes.queue_referral(&["TAKEN1", "FRESH2"]);
        let second = h
            .ledger
            .create_referral(h.business_id, h.invite("Carol", "carol@example.com"))
            .await
            .unwrap()
            .referral;
        assert_eq!(first.referral_code, "TAKEN1");
        assert_eq!(second.referral_code, "FRESH2");
        assert_eq!(h.stats().total_referrals, 2);

        let existing = fixtures::issued_reward(h.business_id, h.referrer_id, "FDUPLICATE", fixtures::start());
        h.store.put_reward(existing);
        h.codes.queue_reward(&["FDUPLICATE", "FUNIQUE01", "PUNIQUE02"]);
        let outcome = h
            .ledger
            .transition_status(h.business_id, second.id, ReferralStatus::Converted, None)
            .await
            .unwrap();
        let codes: Vec<&str> = outcome.rewards.iter().map(|r| r.code.as_str()).collect();
        assert!(!codes.contains(&"FDUPLICATE"));
        assert_eq!(outcome.rewards.len(), 2);
    }

    #[tokio::test]
    async fn failed_invite_does_not_undo_the_referral() {
        let h = Harness::with_failing_gateway();
        let referral = h.pending_referral().await;
        tokio::task::yield_now().await;

        assert_eq!(h.store.referral(referral.id).status, ReferralStatus::Pending);
        assert_eq!(h.stats().total_referrals, 1);
    }

    #[tokio::test]
    async fn invite_goes_to_the_referee() {
        let h = Harness::new();
        h.pending_referral().await;

        for _ in 0..20 {
            if !h.gateway.sent().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        let sent = h.gateway.sent();
        assert_eq!(sent[0].0, Address::Email("bob@example.com".into()));
        assert_eq!(sent[0].1, "Alice has referred you to Joe's Pizza");
    }

    #[tokio::test]
    async fn follow_up_is_appended_with_delivery_status() {
        let h = Harness::with_failing_gateway();
        let referral = h.pending_referral().await;

        let updated = h
            .ledger
            .send_follow_up(h.business_id, referral.id, FollowUpMethod::Email, "Still interested?")
            .await
            .unwrap();
        assert_eq!(updated.follow_ups.len(), 1);
        assert_eq!(updated.follow_ups[0].status, FollowUpStatus::Failed);

        let err = h
            .ledger
            .send_follow_up(h.business_id, referral.id, FollowUpMethod::Sms, "Hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        h.ledger
            .transition_status(h.business_id, referral.id, ReferralStatus::Rejected, None)
            .await
            .unwrap();
        let err = h
            .ledger
            .send_follow_up(h.business_id, referral.id, FollowUpMethod::Email, "Hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn public_signup_reuses_open_referral() {
        let h = Harness::new();
        let referral = h.pending_referral().await;

        let conversion = h
            .ledger
            .convert_public(
                h.campaign_id,
                h.referrer_id,
                NewCustomer {
                    name: Some("Bob".into()),
                    email: Some("bob@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(conversion.referral.id, referral.id);
        assert_eq!(h.store.referrals().len(), 1);
        assert_eq!(h.stats().total_referrals, 1);

        let err = h
            .ledger
            .convert_public(
                h.campaign_id,
                h.referrer_id,
                NewCustomer {
                    name: Some("Bob".into()),
                    email: Some("BOB@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn public_signup_without_referral_opens_one() {
        let h = Harness::new();
        let conversion = h
            .ledger
            .convert_public(
                h.campaign_id,
                h.referrer_id,
                NewCustomer {
                    name: Some("Carol".into()),
                    email: Some("carol@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(conversion.referral.status, ReferralStatus::Converted);
        assert_eq!(conversion.customer.source, CustomerSource::Referral);
        let stats = h.stats();
        assert_eq!((stats.total_referrals, stats.pending_referrals, stats.successful_referrals), (1, 0, 1));
    }

    #[tokio::test]
    async fn code_conversion_is_tenant_scoped() {
        let h = Harness::new();
        let referral = h.pending_referral().await;

        let err = h
            .ledger
            .convert_by_code(Uuid::new_v4(), &referral.referral_code, NewCustomer::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let conversion = h
            .ledger
            .convert_by_code(h.business_id, &referral.referral_code, NewCustomer::default())
            .await
            .unwrap();
        assert_eq!(
            conversion
                .referral
                .conversion_details
                .and_then(|d| d.conversion_type)
                .as_deref(),
            Some("signup")
        );
    }

    #[tokio::test]
    async fn code_conversion_refuses_an_existing_customer_email() {
        let h = Harness::new();
        let referral = h.pending_referral().await;
        h.store
            .add_customer(fixtures::customer(h.business_id, "Carol", "carol@example.com"));

        let err = h
            .ledger
            .convert_by_code(
                h.business_id,
                &referral.referral_code,
                NewCustomer {
                    name: Some("Carol".into()),
                    email: Some(" Carol@Example.com ".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Storage(StoreError::DuplicateCustomerEmail(ref email)) if email == "carol@example.com"
        ));
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);

        assert_eq!(h.store.customers().len(), 2);
        assert!(h.store.rewards().is_empty());
        let untouched = h.store.referral(referral.id);
        assert_eq!(untouched.status, ReferralStatus::Pending);
        assert!(!untouched.referee.is_linked());
        assert_eq!(h.stats().successful_referrals, 0);
    }

    #[tokio::test]
    async fn sweep_expires_open_referrals_and_frees_counters() {
        let h = Harness::new();
        let stale = h.pending_referral().await;
        let clicked = h
            .ledger
            .create_referral(h.business_id, h.invite("Carol", "carol@example.com"))
            .await
            .unwrap()
            .referral;
        h.ledger.track_click(&clicked.referral_code).await.unwrap();
        let converted = h
            .ledger
            .create_referral(h.business_id, h.invite("Dan", "dan@example.com"))
            .await
            .unwrap()
            .referral;
        h.ledger
            .transition_status(h.business_id, converted.id, ReferralStatus::Converted, None)
            .await
            .unwrap();

        h.clock.advance(Duration::days(31));
        let report = h.ledger.expire_stale().await.unwrap();
        assert_eq!(report.referrals_expired, 2);
        assert_eq!(report.rewards_expired, 0);

        assert_eq!(h.store.referral(stale.id).status, ReferralStatus::Expired);
        assert_eq!(h.store.referral(clicked.id).status, ReferralStatus::Expired);
        assert_eq!(h.store.referral(converted.id).status, ReferralStatus::Converted);
        let stats = h.stats();
        assert_eq!(
            (stats.total_referrals, stats.pending_referrals, stats.clicked_referrals, stats.successful_referrals),
            (3, 0, 0, 1)
        );
        assert_eq!(h.referrer_stats().pending_referrals, 0);

        assert_eq!(h.ledger.expire_stale().await.unwrap(), SweepReport::default());
    }

    #[tokio::test]
    async fn counters_never_go_negative_after_drift() {
        let h = Harness::new();
        let referral = h.pending_referral().await;
        h.store.update_campaign(h.campaign_id, |c| c.statistics.pending_referrals = 0);

        h.ledger.track_click(&referral.referral_code).await.unwrap();
        h.ledger
            .transition_status(h.business_id, referral.id, ReferralStatus::Rejected, None)
            .await
            .unwrap();
        let stats = h.stats();
        assert_eq!(stats.pending_referrals, 0);
        assert_eq!(stats.clicked_referrals, 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Create,
        Click(usize),
        Move(usize, ReferralStatus),
        Advance(i64),
        Sweep,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            2 => Just(Op::Create),
            2 => (0usize..8).prop_map(Op::Click),
            3 => ((0usize..8), proptest::sample::select(ReferralStatus::ALL.to_vec()))
                .prop_map(|(i, s)| Op::Move(i, s)),
            1 => (1i64..20).prop_map(Op::Advance),
            1 => Just(Op::Sweep),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn counters_stay_consistent(ops in proptest::collection::vec(op(), 1..40)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let h = Harness::new();
                let mut ids: Vec<Uuid> = Vec::new();

                for (n, op) in ops.into_iter().enumerate() {
                    match op {
                        Op::Create => {
                            let email = format!("friend{}@example.com", n);
                            if let Ok(created) = h.ledger.create_referral(h.business_id, h.invite("Friend", &email)).await {
                                ids.push(created.referral.id);
                            }
                        }
                        Op::Click(i) if !ids.is_empty() => {
                            let _ = h.ledger.track_click(&ids[i % ids.len()].to_string()).await;
                        }
                        Op::Move(i, status) if !ids.is_empty() => {
                            let _ = h.ledger.transition_status(h.business_id, ids[i % ids.len()], status, None).await;
                        }
                        Op::Advance(days) => h.clock.advance(Duration::days(days)),
                        Op::Sweep => {
                            let _ = h.ledger.expire_stale().await;
                        }
                        _ => {}
                    }

                    let s = h.stats();
                    assert!(s.pending_referrals >= 0 && s.clicked_referrals >= 0 && s.successful_referrals >= 0);
                    assert!(s.pending_referrals + s.clicked_referrals + s.successful_referrals <= s.total_referrals);
                    assert_eq!(s.total_referrals as usize, ids.len());

                    let referrals = h.store.referrals();
                    let count = |f: fn(ReferralStatus) -> bool| referrals.iter().filter(|r| f(r.status)).count() as i64;
                    assert_eq!(s.pending_referrals, count(|st| st == ReferralStatus::Pending));
                    assert_eq!(s.clicked_referrals, count(|st| st == ReferralStatus::Clicked));
                    assert_eq!(
                        s.successful_referrals,
                        count(|st| matches!(st, ReferralStatus::Converted | ReferralStatus::Rewarded))
                    );

                    for referral in &referrals {
                        let rewards = h.store.rewards().into_iter().filter(|r| r.referral_id == referral.id).count();
                        let expected = if matches!(referral.status, ReferralStatus::Converted | ReferralStatus::Rewarded) { 2 } else { 0 };
                        assert_eq!(rewards, expected);
                    }
                }
            });
        }
    }
}
