use rand::{distr::Alphanumeric, Rng};
use serde::Serialize;

use crate::models::campaignmodel::RewardKind;

pub const REFERRAL_CODE_LEN: usize = 6;
pub const REWARD_CODE_SUFFIX_LEN: usize = 8;

/// Source of referral and reward codes. Uniqueness is not its job: the
/// unique indexes catch collisions and the caller asks for another code.
pub trait CodeGenerator: Send + Sync {
    fn referral_code(&self) -> String;
    fn reward_code(&self, kind: RewardKind) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodes;

impl CodeGenerator for RandomCodes {
    fn referral_code(&self) -> String {
        generate_referral_code()
    }

    fn reward_code(&self, kind: RewardKind) -> String {
        generate_reward_code(kind)
    }
}

fn random_code(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

pub fn generate_referral_code() -> String {
    random_code(REFERRAL_CODE_LEN)
}

pub fn generate_reward_code(kind: RewardKind) -> String {
    format!("{}{}", kind.initial(), random_code(REWARD_CODE_SUFFIX_LEN))
}

pub fn generate_referral_link(base_url: &str, code: &str) -> String {
    format!("{}/refer/{}", base_url.trim_end_matches('/'), code)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShareableLinks {
    pub default: String,
    pub facebook: String,
    pub twitter: String,
    pub whatsapp: String,
    pub linkedin: String,
    pub email: String,
}

pub fn shareable_links(referral_link: &str, business_name: &str) -> ShareableLinks {
    let link = urlencoding::encode(referral_link);
    let offer = format!("Check out this special offer from {}!", business_name);
    let whatsapp_text = format!(
        "Check out this special offer from {}: {}",
        business_name, referral_link
    );
    let subject = format!("Special offer from {}", business_name);
    let body = format!(
        "I thought you might be interested in this offer: {}",
        referral_link
    );

    ShareableLinks {
        default: referral_link.to_string(),
        facebook: format!("https://www.facebook.com/sharer/sharer.php?u={}", link),
        twitter: format!(
            "https://twitter.com/intent/tweet?url={}&text={}",
            link,
            urlencoding::encode(&offer)
        ),
        whatsapp: format!("https://wa.me/?text={}", urlencoding::encode(&whatsapp_text)),
        linkedin: format!("https://www.linkedin.com/sharing/share-offsite/?url={}", link),
        email: format!(
            "mailto:?subject={}&body={}",
            urlencoding::encode(&subject),
            urlencoding::encode(&body)
        ),
    }
}

#[cfg(test)]
pub use scripted::ScriptedCodes;

#[cfg(test)]
mod scripted {
    use std::{collections::VecDeque, sync::Mutex};

    use super::*;

    /// Hands out queued codes first, then falls back to random ones.
    #[derive(Default)]
    pub struct ScriptedCodes {
        referral: Mutex<VecDeque<String>>,
        reward: Mutex<VecDeque<String>>,
    }

    impl ScriptedCodes {
        pub fn referral_codes(codes: &[&str]) -> Self {
            let scripted = ScriptedCodes::default();
            scripted.queue_referral(codes);
            scripted
        }

        pub fn queue_referral(&self, codes: &[&str]) {
            self.referral
                .lock()
                .unwrap()
                .extend(codes.iter().map(|c| c.to_string()));
        }

        pub fn queue_reward(&self, codes: &[&str]) {
            self.reward
                .lock()
                .unwrap()
                .extend(codes.iter().map(|c| c.to_string()));
        }
    }

    impl CodeGenerator for ScriptedCodes {
        fn referral_code(&self) -> String {
            self.referral
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(generate_referral_code)
        }

        fn reward_code(&self, kind: RewardKind) -> String {
            self.reward
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| generate_reward_code(kind))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_codes_are_six_uppercase_alphanumerics() {
        for _ in 0..50 {
            let code = generate_referral_code();
            assert_eq!(code.len(), REFERRAL_CODE_LEN);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn reward_codes_start_with_type_initial() {
        let code = generate_reward_code(RewardKind::Fixed);
        assert_eq!(code.len(), 1 + REWARD_CODE_SUFFIX_LEN);
        assert!(code.starts_with('F'));
        assert!(generate_reward_code(RewardKind::Points).starts_with('P'));
    }

    #[test]
    fn referral_link_joins_without_double_slash() {
        assert_eq!(
            generate_referral_link("https://app.example.com/", "AB12CD"),
            "https://app.example.com/refer/AB12CD"
        );
    }

    #[test]
    fn share_links_encode_the_referral_link() {
        let links = shareable_links("https://app.example.com/refer/AB12CD", "Joe's Pizza");
        assert_eq!(links.default, "https://app.example.com/refer/AB12CD");
        assert!(links
            .facebook
            .ends_with("u=https%3A%2F%2Fapp.example.com%2Frefer%2FAB12CD"));
        assert!(links.email.starts_with("mailto:?subject=Special%20offer%20from%20Joe%27s%20Pizza"));
    }
}
