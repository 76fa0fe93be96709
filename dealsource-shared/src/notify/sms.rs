/// SMS gateway
///
/// [`HttpSmsGateway`] talks to a Twilio-compatible REST API (form-encoded
/// `To`, `From`, `Body` posted to `/2010-04-01/Accounts/{sid}/Messages.json`
/// with basic auth). [`LogSmsGateway`] only logs, and is what the worker uses
/// when no gateway credentials are configured.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.twilio.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Replies that opt a vendor out of further messages
const OPT_OUT_KEYWORDS: &[&str] = &["STOP", "STOPALL", "UNSUBSCRIBE", "CANCEL", "END", "QUIT"];

#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    #[error("Invalid phone number: {0}")]
    InvalidNumber(String),

    #[error("SMS request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMS gateway rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, Default)]
pub struct SmsConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub api_base: Option<String>,
}

impl SmsConfig {
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            account_sid: read("SMS_ACCOUNT_SID"),
            auth_token: read("SMS_AUTH_TOKEN"),
            from_number: read("SMS_FROM_NUMBER"),
            api_base: read("SMS_API_BASE"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some() && self.from_number.is_some()
    }
}

/// What the gateway reported for an accepted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsReceipt {
    pub provider_message_id: Option<String>,
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Sends `body` to an E.164 number
    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, SmsError>;
}

pub struct HttpSmsGateway {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    api_base: String,
}

#[derive(Deserialize)]
struct MessageResponse {
    sid: Option<String>,
}

impl HttpSmsGateway {
    /// Returns `None` when credentials are incomplete
    pub fn from_config(config: &SmsConfig) -> Result<Option<Self>, SmsError> {
        let (Some(sid), Some(token), Some(from)) =
            (&config.account_sid, &config.auth_token, &config.from_number)
        else {
            return Ok(None);
        };

        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Some(Self {
            client,
            account_sid: sid.clone(),
            auth_token: token.clone(),
            from_number: from.clone(),
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        }))
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, SmsError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SmsError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessageResponse = response.json().await?;
        Ok(SmsReceipt {
            provider_message_id: parsed.sid,
        })
    }
}

/// Dry-run gateway that only logs
#[derive(Debug, Default, Clone)]
pub struct LogSmsGateway;

#[async_trait]
impl SmsGateway for LogSmsGateway {
    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, SmsError> {
        tracing::info!(to = %to, chars = body.chars().count(), "SMS gateway not configured, message logged only");
        Ok(SmsReceipt {
            provider_message_id: None,
        })
    }
}

/// Normalizes a phone number to E.164
///
/// UK national numbers (`07700 900123`) become `+447700900123`; `00` and `+`
/// international prefixes are kept. Anything that is not 8 to 15 digits after
/// cleanup is rejected.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');

    if trimmed
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')' | '.' | '+')))
    {
        return None;
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    let international = if has_plus {
        digits
    } else if let Some(rest) = digits.strip_prefix("00") {
        rest.to_string()
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("44{}", rest)
    } else if digits.starts_with("44") {
        digits
    } else {
        return None;
    };

    if (8..=15).contains(&international.len()) {
        Some(format!("+{}", international))
    } else {
        None
    }
}

/// True when an inbound message asks to stop further contact
pub fn is_opt_out(body: &str) -> bool {
    let word = body.trim().trim_end_matches(['.', '!']).to_ascii_uppercase();
    OPT_OUT_KEYWORDS.contains(&word.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_uk_numbers() {
        assert_eq!(normalize_phone("07700 900123").as_deref(), Some("+447700900123"));
        assert_eq!(normalize_phone("(07700) 900-123").as_deref(), Some("+447700900123"));
        assert_eq!(normalize_phone("447700900123").as_deref(), Some("+447700900123"));
        assert_eq!(normalize_phone("+44 7700 900123").as_deref(), Some("+447700900123"));
        assert_eq!(normalize_phone("0044 7700 900123").as_deref(), Some("+447700900123"));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("call me"), None);
        assert_eq!(normalize_phone("12345"), None);
        assert_eq!(normalize_phone("+1234567890123456"), None);
    }

    #[test]
    fn test_opt_out_keywords() {
        assert!(is_opt_out("STOP"));
        assert!(is_opt_out("  stop. "));
        assert!(is_opt_out("Unsubscribe"));
        assert!(!is_opt_out("Please don't stop calling"));
        assert!(!is_opt_out("yes interested"));
    }

    #[test]
    fn test_config_completeness() {
        assert!(!SmsConfig::default().is_configured());

        let config = SmsConfig {
            account_sid: Some("AC123".to_string()),
            auth_token: Some("token".to_string()),
            from_number: Some("+441234567890".to_string()),
            api_base: Some("http://localhost:9999/".to_string()),
        };
        assert!(config.is_configured());

        let gateway = HttpSmsGateway::from_config(&config).unwrap().expect("gateway");
        assert_eq!(
            gateway.messages_url(),
            "http://localhost:9999/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn test_incomplete_config_gives_no_gateway() {
        let config = SmsConfig {
            account_sid: Some("AC123".to_string()),
            ..Default::default()
        };
        assert!(HttpSmsGateway::from_config(&config).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_log_gateway_accepts() {
        let receipt = LogSmsGateway.send("+447700900123", "hello").await.unwrap();
        assert!(receipt.provider_message_id.is_none());
    }
}
