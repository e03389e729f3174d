pub mod analytics_service;
pub mod clock;
pub mod error;
#[cfg(test)]
pub mod fixtures;
pub mod notification_service;
pub mod referral;
pub mod referral_ledger;
pub mod reward_service;
pub mod transitions;
