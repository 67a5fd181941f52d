use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, info};

use super::ContactEmail;
use crate::errors::MailError;
use crate::site_config::{MailCredentials, MailSection};

/// Delivers composed contact messages.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Address messages are sent from.
    fn sender(&self) -> &str;
    /// Addresses every message is delivered to.
    fn recipients(&self) -> &[String];
    async fn send(&self, email: ContactEmail) -> Result<(), MailError>;
}

/// SMTP relay with STARTTLS and login credentials.
pub struct SmtpMailer {
    transport: SmtpTransport,
    sender: String,
    recipients: Vec<String>,
}

impl SmtpMailer {
    pub fn new(section: &MailSection, credentials: MailCredentials) -> Result<Self, MailError> {
        let transport = SmtpTransport::starttls_relay(&section.smtp_host)
            .map_err(|e| MailError::Delivery(format!("SMTP relay error: {}", e)))?
            .port(section.smtp_port)
            .credentials(Credentials::new(credentials.user.clone(), credentials.key))
            .build();
        Ok(Self {
            transport,
            sender: credentials.user,
            recipients: credentials.recipients.to_vec(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn sender(&self) -> &str {
        &self.sender
    }

    fn recipients(&self) -> &[String] {
        &self.recipients
    }

    async fn send(&self, email: ContactEmail) -> Result<(), MailError> {
        let message = build_message(&email)?;
        let transport = self.transport.clone();
        let to = email.to.join(", ");

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| MailError::Other(anyhow::anyhow!("mail task panicked: {}", e)))?
            .map_err(|e| MailError::Delivery(e.to_string()))?;

        info!(%to, "contact message delivered");
        Ok(())
    }
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::InvalidAddress {
        address: address.to_string(),
        message: e.to_string(),
    })
}

/// Turn a composed email into a MIME message: text and HTML alternatives,
/// plus the optional attachment.
pub fn build_message(email: &ContactEmail) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .from(mailbox(&email.from)?)
        .subject(email.subject.clone());
    for to in &email.to {
        builder = builder.to(mailbox(to)?);
    }

    let body = MultiPart::alternative_plain_html(email.text.clone(), email.html.clone());
    let body = match &email.attachment {
        Some(attachment) => {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| MailError::Build(format!("attachment content type: {}", e)))?;
            debug!(filename = %attachment.filename, bytes = attachment.data.len(), "attaching image");
            MultiPart::mixed().multipart(body).singlepart(
                MailAttachment::new(attachment.filename.clone())
                    .body(attachment.data.clone(), content_type),
            )
        }
        None => body,
    };

    builder
        .multipart(body)
        .map_err(|e| MailError::Build(e.to_string()))
}

/// Keeps every message in memory instead of sending it.
#[derive(Debug, Default, Clone)]
pub struct RecordingMailer {
    sender: String,
    recipients: Vec<String>,
    sent: Arc<Mutex<Vec<ContactEmail>>>,
    fail_with: Option<String>,
}

impl RecordingMailer {
    pub fn new(sender: &str, recipients: &[&str]) -> Self {
        Self {
            sender: sender.to_string(),
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    /// A mailer whose every delivery fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            sender: "site@example.com".to_string(),
            recipients: vec!["owner@example.com".to_string()],
            fail_with: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<ContactEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn sender(&self) -> &str {
        &self.sender
    }

    fn recipients(&self) -> &[String] {
        &self.recipients
    }

    async fn send(&self, email: ContactEmail) -> Result<(), MailError> {
        if let Some(message) = &self.fail_with {
            return Err(MailError::Delivery(message.clone()));
        }
        build_message(&email)?;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{AI_IMAGE_FILENAME, ContactForm, compose, to_data_url};

    fn form() -> ContactForm {
        ContactForm {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            phone: "123".into(),
            address: "Calle 1".into(),
            message: "Hola".into(),
            ai_image: None,
        }
    }

    fn recipients() -> Vec<String> {
        vec!["a@example.com".into(), "b@example.com".into()]
    }

    #[test]
    fn test_build_message_plain() {
        let email = compose(&form(), "site@example.com", &recipients(), "New contact");
        let raw = String::from_utf8(build_message(&email).unwrap().formatted()).unwrap();
        assert!(raw.contains("Subject: New contact"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("a@example.com"));
        assert!(raw.contains("b@example.com"));
        assert!(!raw.contains("multipart/mixed"));
    }

    #[test]
    fn test_build_message_with_attachment() {
        let mut f = form();
        f.ai_image = Some(to_data_url("image/jpeg", &[1, 2, 3, 4]));
        let email = compose(&f, "site@example.com", &recipients(), "New contact");
        let raw = String::from_utf8(build_message(&email).unwrap().formatted()).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains(AI_IMAGE_FILENAME));
        assert!(raw.contains("image/jpeg"));
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let email = compose(&form(), "not an address", &recipients(), "S");
        let err = build_message(&email).unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress { ref address, .. } if address == "not an address"));
    }

    #[tokio::test]
    async fn test_recording_mailer() {
        let mailer = RecordingMailer::new("site@example.com", &["a@example.com"]);
        let email = compose(&form(), mailer.sender(), mailer.recipients(), "S");
        mailer.send(email).await.unwrap();
        assert_eq!(mailer.sent().len(), 1);

        let failing = RecordingMailer::failing("relay down");
        let email = compose(&form(), failing.sender(), failing.recipients(), "S");
        assert!(matches!(failing.send(email).await, Err(MailError::Delivery(_))));
        assert!(failing.sent().is_empty());
    }

    #[test]
    fn test_smtp_mailer_uses_credentials() {
        let creds = MailCredentials {
            user: "site@example.com".into(),
            key: "secret".into(),
            recipients: ["a@example.com".into(), "b@example.com".into()],
        };
        let mailer = SmtpMailer::new(&MailSection::default(), creds).unwrap();
        assert_eq!(mailer.sender(), "site@example.com");
        assert_eq!(mailer.recipients().len(), 2);
    }
}
