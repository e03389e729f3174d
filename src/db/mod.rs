pub mod analyticsdb;
pub mod campaigndb;
pub mod customerdb;
pub mod db;
pub mod ledgerdb;
pub mod referraldb;
pub mod userdb;

#[cfg(test)]
pub mod memory;

pub use analyticsdb::AnalyticsExt;
pub use campaigndb::{CampaignChanges, CampaignExt, NewCampaign};
pub use customerdb::{CustomerChanges, CustomerExt};
pub use db::DBClient;
pub use ledgerdb::{
    ClickUpdate, LedgerStore, RefereeLink, ReferralDraft, RewardStatusUpdate, StoreError,
    TransitionOutcome, TransitionUnit,
};
pub use referraldb::{ReferralExt, ReferralFilter, RewardExt, RewardFilter};
pub use userdb::{BusinessChanges, BusinessExt, NewBusinessProfile, UserExt};
