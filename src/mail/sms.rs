use std::time::Duration;

/// SMS transport over Twilio's Messages REST endpoint.
#[derive(Debug, Clone)]
pub struct TwilioSms {
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
}

impl TwilioSms {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
    ) -> Self {
        TwilioSms {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: from_number.into(),
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        )
    }

    /// Returns the message SID.
    pub async fn send_sms(&self, to: &str, body: &str) -> Result<String, String> {
        let form = serde_urlencoded::to_string([
            ("To", to),
            ("From", self.from_number.as_str()),
            ("Body", body),
        ])
        .map_err(|e| format!("Could not encode SMS body: {}", e))?;

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .timeout(Duration::from_secs(15))
            .body(form)
            .send()
            .await
            .map_err(|e| format!("Network error: {}", e))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .unwrap_or_else(|_| "No response body".to_string());

        if !status.is_success() {
            tracing::error!("Twilio rejected SMS to {}: {}", to, response_text);
            return Err(format!(
                "Twilio API error ({}): {}",
                status.as_u16(),
                response_text
            ));
        }

        let sid = serde_json::from_str::<serde_json::Value>(&response_text)
            .ok()
            .and_then(|body| body.get("sid").and_then(|v| v.as_str()).map(str::to_string))
            .unwrap_or_else(|| "queued".to_string());

        tracing::info!("SMS sent to {} (sid: {})", to, sid);
        Ok(sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_url_embeds_account() {
        let sms = TwilioSms::new("AC123", "token", "+15550000000");
        assert_eq!(
            sms.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }
}
