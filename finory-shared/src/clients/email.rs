use reqwest::Client;
use serde::Serialize;

#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_key: String,
    from_email: String,
    from_name: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

fn code_email(title: &str, intro: &str, code: &str, footer: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
            <h2 style="color: #0f766e;">Finory IA - {title}</h2>
            <p>{intro}</p>
            <div style="background: #f0fdfa; color: #0f766e; font-size: 32px; font-weight: bold; text-align: center; padding: 20px; border-radius: 8px; letter-spacing: 8px;">{code}</div>
            <p style="color: #666; margin-top: 20px;">{footer}</p>
            </div>"#
    )
}

impl EmailClient {
    pub fn new(api_key: &str, from_email: &str, from_name: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        }
    }

    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<(), String> {
        let request = ResendRequest {
            from: format!("{} <{}>", self.from_name, self.from_email),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        };

        let response = self.client
            .post("https://api.resend.com/emails")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("email send failed: {e}"))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("email API error: {body}"));
        }

        tracing::debug!(subject = %subject, "email sent");
        Ok(())
    }

    pub async fn send_verification_code(&self, to: &str, code: &str, valid_minutes: i64) -> Result<(), String> {
        let html = code_email(
            "Email Verification",
            "Your verification code is:",
            code,
            &format!("This code expires in {valid_minutes} minutes."),
        );

        self.send_email(to, "Finory IA - Verify your email", &html).await
    }

    pub async fn send_password_reset_code(&self, to: &str, code: &str, valid_minutes: i64) -> Result<(), String> {
        let html = code_email(
            "Password Reset",
            "Your password reset code is:",
            code,
            &format!("This code expires in {valid_minutes} minutes. If you did not request this, please ignore this email."),
        );

        self.send_email(to, "Finory IA - Reset your password", &html).await
    }
}
