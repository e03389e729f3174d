use crate::models::{
    campaignmodel::Campaign,
    rewardmodel::{NotificationKind, Reward},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

fn fill(template: &str, placeholders: &[(&str, &str)]) -> String {
    let mut text = template.to_string();
    for (key, value) in placeholders {
        text = text.replace(key, value);
    }
    text
}

/// Invite sent to a referee. Campaign-level subject/body override the
/// defaults and may use `{{refereeName}}`, `{{referrerName}}`,
/// `{{businessName}}` and `{{referralLink}}`.
pub fn referral_invite(
    campaign: &Campaign,
    business_name: &str,
    referrer_name: &str,
    referee_name: &str,
    referral_link: &str,
) -> Message {
    let placeholders = [
        ("{{refereeName}}", referee_name),
        ("{{referrerName}}", referrer_name),
        ("{{businessName}}", business_name),
        ("{{referralLink}}", referral_link),
    ];

    let subject = match campaign.email_subject.as_deref() {
        Some(custom) if !custom.trim().is_empty() => fill(custom, &placeholders),
        _ => format!("{} has referred you to {}", referrer_name, business_name),
    };
    let body = match campaign.email_body.as_deref() {
        Some(custom) if !custom.trim().is_empty() => fill(custom, &placeholders),
        _ => format!(
            "Hello {},\n\n{} thinks you might be interested in {}.\n\nClick the link below to learn more and claim your special offer:\n{}\n\nThank you!",
            referee_name, referrer_name, business_name, referral_link
        ),
    };

    Message { subject, body }
}

pub fn referral_follow_up(
    business_name: &str,
    referee_name: &str,
    message: &str,
    referral_link: &str,
) -> Message {
    Message {
        subject: format!("A reminder from {}", business_name),
        body: format!(
            "Hello {},\n\n{}\n\nYour referral link: {}\n\nThank you!",
            referee_name, message, referral_link
        ),
    }
}

fn reward_details(reward: &Reward, with_code: bool) -> String {
    let mut details = format!(
        "Reward Details:\nType: {}\nValue: {}\n",
        reward.reward_type.to_str(),
        reward.value
    );
    if let Some(description) = &reward.description {
        details.push_str(&format!("Description: {}\n", description));
    }
    if with_code {
        details.push_str(&format!("\nCode: {}", reward.code));
    }
    details
}

pub fn reward_notification(
    kind: NotificationKind,
    business_name: &str,
    recipient_name: &str,
    reward: &Reward,
    custom_message: Option<&str>,
) -> Message {
    let custom = custom_message.filter(|m| !m.trim().is_empty()).map(str::to_string);

    match kind {
        NotificationKind::Issued => Message {
            subject: "Your Reward is Ready!".to_string(),
            body: custom.unwrap_or_else(|| {
                format!(
                    "Congratulations! Your reward from {} is now available.\n\n{}\n\nTo claim your reward, please visit our store or website and present this code.\n\nThank you for your referral!",
                    business_name,
                    reward_details(reward, true)
                )
            }),
        },
        NotificationKind::Reminder => Message {
            subject: "Reminder: You Have an Unclaimed Reward".to_string(),
            body: custom.unwrap_or_else(|| {
                format!(
                    "Hello {},\n\nThis is a friendly reminder that you have an unclaimed reward from {}.\n\n{}\n\nTo claim your reward, please visit our store or website and present this code.\n\nThank you!",
                    recipient_name,
                    business_name,
                    reward_details(reward, true)
                )
            }),
        },
        NotificationKind::ExpiringSoon => Message {
            subject: "Your Reward is Expiring Soon".to_string(),
            body: custom.unwrap_or_else(|| {
                format!(
                    "Hello {},\n\nYour reward from {} is expiring soon.\n\n{}\n\nExpiration Date: {}\n\nTo claim your reward, please visit our store or website and present this code before it expires.\n\nThank you!",
                    recipient_name,
                    business_name,
                    reward_details(reward, true),
                    reward.expires_at.format("%Y-%m-%d")
                )
            }),
        },
        NotificationKind::Expired => Message {
            subject: "Your Reward Has Expired".to_string(),
            body: custom.unwrap_or_else(|| {
                format!(
                    "Hello {},\n\nWe're sorry to inform you that your reward from {} has expired.\n\n{}\n\nIf you would like to earn more rewards, consider referring more friends to our business.\n\nThank you!",
                    recipient_name,
                    business_name,
                    reward_details(reward, false)
                )
            }),
        },
    }
}
