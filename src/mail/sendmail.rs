use serde_json::json;
use tokio::time::{sleep, Duration};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1000;
const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Email transport over the Resend HTTP API.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    api_key: String,
    from_email: String,
    client: reqwest::Client,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>, from_email: impl Into<String>) -> Self {
        ResendMailer {
            api_key: api_key.into(),
            from_email: from_email.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Sends a plain-text message, rendered to minimal HTML. Returns the Resend id.
    pub async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        text_body: &str,
    ) -> Result<String, String> {
        if to_email.is_empty() {
            return Err("Email recipient cannot be empty".to_string());
        }
        if !to_email.contains('@') {
            return Err(format!("Invalid email address: {}", to_email));
        }

        let html_body = render_html(text_body);
        self.send_with_retries(to_email, subject, text_body, &html_body)
            .await
    }

    async fn send_with_retries(
        &self,
        to_email: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<String, String> {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.send_via_resend(to_email, subject, text_body, html_body).await {
                Ok(email_id) => {
                    tracing::info!("Email sent to {} (id: {})", to_email, email_id);
                    return Ok(email_id);
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < MAX_RETRIES {
                        let delay = RETRY_DELAY_MS * (2_u64.pow(attempt - 1));
                        tracing::warn!(
                            "Email send attempt {} failed for {}. Retrying in {}ms...",
                            attempt,
                            to_email,
                            delay
                        );
                        sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        let error_msg = last_error
            .map(|e| format!("Failed after {} retries: {}", MAX_RETRIES, e))
            .unwrap_or_else(|| "Unknown email sending error".to_string());

        tracing::error!("Email failed for {}: {}", to_email, error_msg);
        Err(error_msg)
    }

    async fn send_via_resend(
        &self,
        to_email: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<String, String> {
        let request_body = json!({
            "from": self.from_email,
            "to": to_email,
            "subject": subject,
            "text": text_body,
            "html": html_body,
        });

        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| format!("Network error: {}", e))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .unwrap_or_else(|_| "No response body".to_string());

        if status.is_success() {
            if let Ok(body) = serde_json::from_str::<serde_json::Value>(&response_text) {
                if let Some(id) = body.get("id").and_then(|v| v.as_str()) {
                    return Ok(id.to_string());
                }
            }
            Ok("success".to_string())
        } else {
            Err(format!(
                "Resend API error ({}): {}",
                status.as_u16(),
                response_text
            ))
        }
    }
}

fn render_html(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    let paragraphs: Vec<String> = escaped
        .split("\n\n")
        .map(|p| format!("<p>{}</p>", p.replace('\n', "<br>")))
        .collect();
    paragraphs.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_rendering_escapes_and_breaks_lines() {
        let html = render_html("Hi <b>Bob</b>,\n\nLine one\nLine two");
        assert_eq!(html, "<p>Hi &lt;b&gt;Bob&lt;/b&gt;,</p>\n<p>Line one<br>Line two</p>");
    }

    #[tokio::test]
    async fn invalid_recipient_fails_before_any_request() {
        let mailer = ResendMailer::new("key", "Test <test@example.com>");
        let err = mailer.send_email("not-an-email", "Hi", "Body").await.unwrap_err();
        assert!(err.contains("Invalid email address"));
    }
}
