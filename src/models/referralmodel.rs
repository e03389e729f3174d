use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "referral_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Clicked,
    Converted,
    Rewarded,
    Expired,
    Rejected,
}

impl ReferralStatus {
    pub const ALL: [ReferralStatus; 6] = [
        ReferralStatus::Pending,
        ReferralStatus::Clicked,
        ReferralStatus::Converted,
        ReferralStatus::Rewarded,
        ReferralStatus::Expired,
        ReferralStatus::Rejected,
    ];

    pub fn to_str(&self) -> &str {
        match self {
            ReferralStatus::Pending => "pending",
            ReferralStatus::Clicked => "clicked",
            ReferralStatus::Converted => "converted",
            ReferralStatus::Rewarded => "rewarded",
            ReferralStatus::Expired => "expired",
            ReferralStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReferralStatus::Rewarded | ReferralStatus::Expired | ReferralStatus::Rejected
        )
    }

    /// Still waiting on the referee.
    pub fn is_open(&self) -> bool {
        matches!(self, ReferralStatus::Pending | ReferralStatus::Clicked)
    }
}

impl std::fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

impl std::str::FromStr for ReferralStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReferralStatus::ALL
            .iter()
            .copied()
            .find(|status| status.to_str() == s)
            .ok_or_else(|| format!("Unknown referral status '{}'", s))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash, Default)]
#[sqlx(type_name = "sharing_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SharingMethod {
    Sms,
    Email,
    Facebook,
    Twitter,
    Whatsapp,
    Copy,
    #[default]
    Other,
}

impl SharingMethod {
    pub const ALL: [SharingMethod; 7] = [
        SharingMethod::Sms,
        SharingMethod::Email,
        SharingMethod::Facebook,
        SharingMethod::Twitter,
        SharingMethod::Whatsapp,
        SharingMethod::Copy,
        SharingMethod::Other,
    ];

    pub fn to_str(&self) -> &str {
        match self {
            SharingMethod::Sms => "sms",
            SharingMethod::Email => "email",
            SharingMethod::Facebook => "facebook",
            SharingMethod::Twitter => "twitter",
            SharingMethod::Whatsapp => "whatsapp",
            SharingMethod::Copy => "copy",
            SharingMethod::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RefereeContact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// The person being referred. Starts as a bare contact snapshot and becomes
/// linked once the referee exists as a customer of the business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Referee {
    Anonymous {
        #[serde(flatten)]
        contact: RefereeContact,
    },
    Linked {
        #[serde(rename = "customerId")]
        customer_id: Uuid,
        #[serde(flatten)]
        contact: RefereeContact,
    },
}

impl Referee {
    pub fn contact(&self) -> &RefereeContact {
        match self {
            Referee::Anonymous { contact } | Referee::Linked { contact, .. } => contact,
        }
    }

    pub fn customer_id(&self) -> Option<Uuid> {
        match self {
            Referee::Anonymous { .. } => None,
            Referee::Linked { customer_id, .. } => Some(*customer_id),
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self, Referee::Linked { .. })
    }

    pub fn link(self, customer_id: Uuid) -> Referee {
        match self {
            Referee::Anonymous { contact } | Referee::Linked { contact, .. } => {
                Referee::Linked { customer_id, contact }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversionDetails {
    pub converted_at: Option<DateTime<Utc>>,
    pub conversion_type: Option<String>,
    pub conversion_value: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpMethod {
    Email,
    Sms,
    Ai,
}

impl std::str::FromStr for FollowUpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(FollowUpMethod::Email),
            "sms" => Ok(FollowUpMethod::Sms),
            "ai" => Ok(FollowUpMethod::Ai),
            other => Err(format!("Unknown follow-up method '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpStatus {
    Sent,
    Delivered,
    Opened,
    Clicked,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    pub sent_at: DateTime<Utc>,
    pub method: FollowUpMethod,
    pub message: String,
    pub status: FollowUpStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub business_id: Uuid,
    pub referrer_id: Uuid,
    pub referee: Referee,
    pub status: ReferralStatus,
    pub referral_code: String,
    pub referral_link: String,
    pub click_count: i64,
    pub last_clicked_at: Option<DateTime<Utc>>,
    pub conversion_details: Option<ConversionDetails>,
    pub sharing_method: SharingMethod,
    pub follow_ups: Vec<FollowUp>,
    pub expires_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Referral {
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReferralRow {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub business_id: Uuid,
    pub referrer_id: Uuid,
    pub referee_name: String,
    pub referee_email: String,
    pub referee_phone: Option<String>,
    pub referee_customer_id: Option<Uuid>,
    pub status: ReferralStatus,
    pub referral_code: String,
    pub referral_link: String,
    pub click_count: i64,
    pub last_clicked_at: Option<DateTime<Utc>>,
    pub converted_at: Option<DateTime<Utc>>,
    pub conversion_type: Option<String>,
    pub conversion_value: Option<f64>,
    pub conversion_notes: Option<String>,
    pub sharing_method: SharingMethod,
    pub follow_ups: Json<Vec<FollowUp>>,
    pub expires_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReferralRow> for Referral {
    fn from(row: ReferralRow) -> Self {
        let contact = RefereeContact {
            name: row.referee_name,
            email: row.referee_email,
            phone: row.referee_phone,
        };
        let referee = match row.referee_customer_id {
            Some(customer_id) => Referee::Linked { customer_id, contact },
            None => Referee::Anonymous { contact },
        };

        let has_conversion = row.converted_at.is_some()
            || row.conversion_type.is_some()
            || row.conversion_value.is_some()
            || row.conversion_notes.is_some();
        let conversion_details = has_conversion.then(|| ConversionDetails {
            converted_at: row.converted_at,
            conversion_type: row.conversion_type,
            conversion_value: row.conversion_value,
            notes: row.conversion_notes,
        });

        Referral {
            id: row.id,
            campaign_id: row.campaign_id,
            business_id: row.business_id,
            referrer_id: row.referrer_id,
            referee,
            status: row.status,
            referral_code: row.referral_code,
            referral_link: row.referral_link,
            click_count: row.click_count,
            last_clicked_at: row.last_clicked_at,
            conversion_details,
            sharing_method: row.sharing_method,
            follow_ups: row.follow_ups.0,
            expires_at: row.expires_at,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in ReferralStatus::ALL {
            assert_eq!(status.to_str().parse::<ReferralStatus>(), Ok(status));
        }
        assert!("archived".parse::<ReferralStatus>().is_err());
    }

    #[test]
    fn linking_keeps_the_contact_snapshot() {
        let referee = Referee::Anonymous {
            contact: RefereeContact {
                name: "Bob".into(),
                email: "bob@example.com".into(),
                phone: None,
            },
        };
        let id = Uuid::new_v4();
        let linked = referee.link(id);
        assert_eq!(linked.customer_id(), Some(id));
        assert_eq!(linked.contact().email, "bob@example.com");
    }

    #[test]
    fn linked_referee_serializes_with_state_tag() {
        let id = Uuid::new_v4();
        let referee = Referee::Linked {
            customer_id: id,
            contact: RefereeContact {
                name: "Bob".into(),
                email: "bob@example.com".into(),
                phone: None,
            },
        };
        let value = serde_json::to_value(&referee).unwrap();
        assert_eq!(value["state"], "linked");
        assert_eq!(value["customerId"], id.to_string());
        assert_eq!(value["name"], "Bob");
    }
}
