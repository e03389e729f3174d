#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub app_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    // Notification transports (both optional; unset means log-only)
    pub resend_api_key: Option<String>,
    pub from_email: String,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_phone_number: Option<String>,
    pub notification_timeout_secs: u64,
    // Ledger settings
    pub reward_expiration_days: i64,
    pub cron_secret: Option<String>,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let jwt_maxage = std::env::var("JWT_MAXAGE").expect("JWT_MAXAGE must be set");
        let app_url = std::env::var("APP_URL").expect("APP_URL must be set");

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8000);

        let resend_api_key = optional_var("RESEND_API_KEY");
        let from_email = std::env::var("FROM_EMAIL")
            .unwrap_or_else(|_| "Referly <noreply@referly.app>".to_string());

        let twilio_account_sid = optional_var("TWILIO_ACCOUNT_SID");
        let twilio_auth_token = optional_var("TWILIO_AUTH_TOKEN");
        let twilio_phone_number = optional_var("TWILIO_PHONE_NUMBER");

        let notification_timeout_secs = std::env::var("NOTIFICATION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);

        let reward_expiration_days =
            reward_expiration_days(std::env::var("REWARD_EXPIRATION_DAYS").ok().as_deref());

        let cron_secret = optional_var("CRON_SECRET");

        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://localhost:8000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Config {
            database_url,
            app_url: app_url.trim_end_matches('/').to_string(),
            jwt_secret,
            jwt_maxage: jwt_maxage.parse::<i64>().expect("JWT_MAXAGE must be a number of minutes"),
            port,
            resend_api_key,
            from_email,
            twilio_account_sid,
            twilio_auth_token,
            twilio_phone_number,
            notification_timeout_secs,
            reward_expiration_days,
            cron_secret,
            cors_origins,
        }
    }
}

const DEFAULT_REWARD_EXPIRATION_DAYS: i64 = 90;
const MAX_REWARD_EXPIRATION_DAYS: i64 = 3650;

/// Unparseable or non-positive values fall back to the default; large ones
/// are capped so expiry dates stay representable.
fn reward_expiration_days(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|days| *days > 0)
        .map(|days| days.min(MAX_REWARD_EXPIRATION_DAYS))
        .unwrap_or(DEFAULT_REWARD_EXPIRATION_DAYS)
}

fn optional_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_expiration_is_bounded() {
        assert_eq!(reward_expiration_days(None), 90);
        assert_eq!(reward_expiration_days(Some("abc")), 90);
        assert_eq!(reward_expiration_days(Some("0")), 90);
        assert_eq!(reward_expiration_days(Some(" 30 ")), 30);
        assert_eq!(reward_expiration_days(Some("9223372036854775807")), 3650);
    }
}
