pub mod analytics;
pub mod auth;
pub mod business;
pub mod campaign;
pub mod customer;
pub mod maintenance;
pub mod referral;
pub mod reward;
