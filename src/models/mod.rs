pub mod analyticsmodel;
pub mod businessmodel;
pub mod campaignmodel;
pub mod customermodel;
pub mod referralmodel;
pub mod rewardmodel;
pub mod usermodel;
