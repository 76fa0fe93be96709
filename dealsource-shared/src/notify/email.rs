/// SMTP email delivery
///
/// When no SMTP host is configured, sends are logged and skipped so local
/// development works without a relay.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid email address: {0}")]
    Address(String),

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// SMTP settings, read from `SMTP_*` variables by the API config
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_tls: bool,
    pub from_address: Option<String>,
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_tls: true,
            from_address: None,
            from_name: "DealSource".to_string(),
        }
    }
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.from_address.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    fn transport(&self, host: &str) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let builder = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| MailError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        }
        .port(self.config.smtp_port);

        let builder = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let (Some(host), Some(from_address)) = (&self.config.smtp_host, &self.config.from_address)
        else {
            tracing::warn!(to = %message.to, subject = %message.subject, "SMTP not configured, skipping email");
            return Ok(());
        };

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address)
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::Address(e.to_string()))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::Address(e.to_string()))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.clone())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(message.text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(message.html_body),
                    ),
            )
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport(host)?
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        tracing::info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

/// Builds the password reset email
pub fn password_reset_email(
    to: &str,
    first_name: &str,
    reset_url: &str,
    valid_for_minutes: i64,
) -> EmailMessage {
    let text_body = format!(
        "Hi {first_name},\n\n\
         We received a request to reset your DealSource password.\n\n\
         Reset it here: {reset_url}\n\n\
         This link expires in {valid_for_minutes} minutes. If you did not ask for a reset you can ignore this email.\n"
    );

    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #1f2937;">
    <p>Hi {first_name},</p>
    <p>We received a request to reset your DealSource password.</p>
    <p><a href="{reset_url}" style="background:#1d4ed8;color:#ffffff;padding:10px 18px;border-radius:4px;text-decoration:none;">Reset password</a></p>
    <p style="color:#6b7280;">This link expires in {valid_for_minutes} minutes. If you did not ask for a reset you can ignore this email.</p>
</body>
</html>"#,
        first_name = html_escape(first_name),
        reset_url = html_escape(reset_url),
    );

    EmailMessage {
        to: to.to_string(),
        subject: "Reset your DealSource password".to_string(),
        text_body,
        html_body,
    }
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_not_configured() {
        let config = EmailConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.smtp_port, 587);
    }

    #[tokio::test]
    async fn test_unconfigured_mailer_skips() {
        let mailer = SmtpMailer::new(EmailConfig::default());
        assert!(!mailer.is_enabled());

        let message = password_reset_email("a@example.com", "Al", "http://localhost/reset?token=x", 60);
        assert!(mailer.send(message).await.is_ok());
    }

    #[test]
    fn test_reset_email_contents() {
        let message = password_reset_email(
            "kim@example.com",
            "Kim <script>",
            "https://app.example.com/reset-password?token=abc&x=1",
            60,
        );

        assert_eq!(message.to, "kim@example.com");
        assert!(message.text_body.contains("https://app.example.com/reset-password?token=abc&x=1"));
        assert!(message.text_body.contains("60 minutes"));
        assert!(message.html_body.contains("token=abc&amp;x=1"));
        assert!(message.html_body.contains("Kim &lt;script&gt;"));
    }
}
