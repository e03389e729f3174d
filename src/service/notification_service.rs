use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::{
    config::Config,
    mail::{mails::Message, sendmail::ResendMailer, sms::TwilioSms},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Email(String),
    Phone(String),
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Email(email) => write!(f, "email:{}", email),
            Address::Phone(phone) => write!(f, "sms:{}", phone),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("{0} delivery is not configured")]
    NotConfigured(&'static str),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Outbound message transport. Returns the provider's message id.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, to: &Address, subject: &str, body: &str) -> Result<String, NotificationError>;
}

/// Routes email through Resend and SMS through Twilio; either may be absent.
pub struct TransportGateway {
    email: Option<ResendMailer>,
    sms: Option<TwilioSms>,
}

impl TransportGateway {
    pub fn from_config(config: &Config) -> Self {
        let email = config
            .resend_api_key
            .as_ref()
            .map(|key| ResendMailer::new(key.clone(), config.from_email.clone()));

        let sms = match (
            &config.twilio_account_sid,
            &config.twilio_auth_token,
            &config.twilio_phone_number,
        ) {
            (Some(sid), Some(token), Some(number)) => {
                Some(TwilioSms::new(sid.clone(), token.clone(), number.clone()))
            }
            _ => None,
        };

        if email.is_none() {
            tracing::warn!("RESEND_API_KEY not set, emails will not be delivered");
        }
        if sms.is_none() {
            tracing::warn!("Twilio credentials not set, SMS will not be delivered");
        }

        TransportGateway { email, sms }
    }
}

#[async_trait]
impl NotificationGateway for TransportGateway {
    async fn send(&self, to: &Address, subject: &str, body: &str) -> Result<String, NotificationError> {
        match to {
            Address::Email(email) => {
                let mailer = self.email.as_ref().ok_or(NotificationError::NotConfigured("Email"))?;
                mailer
                    .send_email(email, subject, body)
                    .await
                    .map_err(NotificationError::Delivery)
            }
            Address::Phone(phone) => {
                let sms = self.sms.as_ref().ok_or(NotificationError::NotConfigured("SMS"))?;
                sms.send_sms(phone, body)
                    .await
                    .map_err(NotificationError::Delivery)
            }
        }
    }
}

/// Timeout-bounded delivery on top of a gateway. Nothing in here ever fails
/// the caller's ledger operation; `dispatch` detaches completely.
#[derive(Clone)]
pub struct NotificationService {
    gateway: Arc<dyn NotificationGateway>,
    timeout: Duration,
}

impl NotificationService {
    pub fn new(gateway: Arc<dyn NotificationGateway>, timeout: Duration) -> Self {
        NotificationService { gateway, timeout }
    }

    pub async fn send(&self, to: &Address, message: &Message) -> Result<String, NotificationError> {
        let result = tokio::time::timeout(
            self.timeout,
            self.gateway.send(to, &message.subject, &message.body),
        )
        .await
        .unwrap_or(Err(NotificationError::Timeout(self.timeout)));

        match &result {
            Ok(id) => tracing::info!("notification '{}' delivered to {} ({})", message.subject, to, id),
            Err(e) => tracing::warn!("notification '{}' to {} failed: {}", message.subject, to, e),
        }
        result
    }

    pub fn dispatch(&self, to: Address, message: Message) -> JoinHandle<Result<String, NotificationError>> {
        let service = self.clone();
        tokio::spawn(async move { service.send(&to, &message).await })
    }
}

#[cfg(test)]
pub use testing::{FailingGateway, RecordingGateway};

#[cfg(test)]
mod testing {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingGateway {
        pub sent: Mutex<Vec<(Address, String, String)>>,
    }

    impl RecordingGateway {
        pub fn sent(&self) -> Vec<(Address, String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationGateway for RecordingGateway {
        async fn send(&self, to: &Address, subject: &str, body: &str) -> Result<String, NotificationError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push((to.clone(), subject.to_string(), body.to_string()));
            Ok(format!("msg-{}", sent.len()))
        }
    }

    pub struct FailingGateway;

    #[async_trait]
    impl NotificationGateway for FailingGateway {
        async fn send(&self, _to: &Address, _subject: &str, _body: &str) -> Result<String, NotificationError> {
            Err(NotificationError::Delivery("smtp down".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowGateway;

    #[async_trait]
    impl NotificationGateway for SlowGateway {
        async fn send(&self, _to: &Address, _subject: &str, _body: &str) -> Result<String, NotificationError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    fn message() -> Message {
        Message {
            subject: "Hi".to_string(),
            body: "Body".to_string(),
        }
    }

    #[tokio::test]
    async fn slow_gateway_times_out() {
        let service = NotificationService::new(Arc::new(SlowGateway), Duration::from_millis(20));
        let err = service
            .send(&Address::Email("a@example.com".into()), &message())
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Timeout(_)));
    }

    #[tokio::test]
    async fn dispatch_delivers_in_background() {
        let gateway = Arc::new(RecordingGateway::default());
        let service = NotificationService::new(gateway.clone(), Duration::from_secs(1));
        let handle = service.dispatch(Address::Phone("+15551234567".into()), message());
        assert_eq!(handle.await.unwrap().unwrap(), "msg-1");
        assert_eq!(gateway.sent().len(), 1);
    }

    #[tokio::test]
    async fn unconfigured_transport_reports_error() {
        let gateway = TransportGateway { email: None, sms: None };
        let err = gateway
            .send(&Address::Email("a@example.com".into()), "s", "b")
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::NotConfigured("Email")));
    }
}
