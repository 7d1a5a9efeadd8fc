use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Outbound email. `text` carries the invite link, so it is kept out of
/// `Debug` output.
#[derive(Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl fmt::Debug for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Email")
            .field("to", &self.to)
            .field("subject", &self.subject)
            .field("text", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
#[error("email delivery failed: {0}")]
pub struct DeliveryError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), DeliveryError>;
}

// -- HTTP transactional email API --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody<'a> {
    sender: EmailAddress<'a>,
    to: Vec<EmailAddress<'a>>,
    subject: &'a str,
    text_content: &'a str,
}

/// Posts to a Brevo-compatible `smtp/email` endpoint.
pub struct HttpEmailNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender_email: String,
    sender_name: Option<String>,
}

impl HttpEmailNotifier {
    pub fn new(
        api_url: String,
        api_key: String,
        sender_email: String,
        sender_name: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            sender_email,
            sender_name,
        }
    }
}

#[async_trait]
impl Notifier for HttpEmailNotifier {
    async fn send(&self, email: &Email) -> Result<(), DeliveryError> {
        let body = SendEmailBody {
            sender: EmailAddress {
                email: &self.sender_email,
                name: self.sender_name.as_deref(),
            },
            to: vec![EmailAddress {
                email: &email.to,
                name: None,
            }],
            subject: &email.subject,
            text_content: &email.text,
        };

        let resp = self
            .client
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError(format!("request failed: {}", e)))?;

        let status = resp.status();
        if status.is_success() {
            debug!("Email accepted by provider for {}", email.to);
            return Ok(());
        }

        let detail = resp.text().await.unwrap_or_default();
        Err(DeliveryError(format!("provider returned {}: {}", status, detail)))
    }
}

// -- Disabled --

/// Used when no email provider is configured. Every send fails, so issuance
/// reports the invite as undelivered and the owner can resend later.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, email: &Email) -> Result<(), DeliveryError> {
        warn!("Email delivery is not configured; dropping mail to {}", email.to);
        Err(DeliveryError("email delivery is not configured".into()))
    }
}

// -- In-memory outbox --

/// Keeps every mail in memory. Can be switched into a failing mode.
#[derive(Default)]
pub struct MemoryNotifier {
    outbox: Mutex<Vec<Email>>,
    failing: AtomicBool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Email> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Email> {
        self.sent().pop()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, email: &Email) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError("outbox is in failing mode".into()));
        }
        self.outbox
            .lock()
            .map_err(|_| DeliveryError("outbox lock poisoned".into()))?
            .push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> Email {
        Email {
            to: "a@x.com".into(),
            subject: "Invite".into(),
            text: "https://example/invites/accept?token=secret".into(),
        }
    }

    #[test]
    fn debug_hides_body() {
        let rendered = format!("{:?}", mail());
        assert!(rendered.contains("a@x.com"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn payload_uses_provider_field_names() {
        let email = mail();
        let body = SendEmailBody {
            sender: EmailAddress { email: "noreply@x.com", name: Some("Taskboard") },
            to: vec![EmailAddress { email: &email.to, name: None }],
            subject: &email.subject,
            text_content: &email.text,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["sender"]["name"], "Taskboard");
        assert_eq!(json["to"][0]["email"], "a@x.com");
        assert!(json["to"][0].get("name").is_none());
        assert!(json.get("textContent").is_some());
    }

    #[tokio::test]
    async fn memory_outbox_records_and_fails_on_demand() {
        let outbox = MemoryNotifier::new();
        outbox.send(&mail()).await.unwrap();
        assert_eq!(outbox.sent().len(), 1);

        outbox.set_failing(true);
        assert!(outbox.send(&mail()).await.is_err());
        assert_eq!(outbox.sent().len(), 1);
    }

    #[tokio::test]
    async fn disabled_notifier_always_fails() {
        assert!(DisabledNotifier.send(&mail()).await.is_err());
    }
}
