//! Outgoing email.
//!
//! [`SmtpMailer`] delivers through `lettre`'s async SMTP transport. Without
//! SMTP settings the service falls back to [`LogMailer`], which only records
//! the message in the log.

use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use regex::Regex;

use crate::config::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),

    #[error("Email template error: {0}")]
    Template(#[from] tera::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text_body: String,
    /// Sent as a `text/html` alternative when present.
    pub html_body: Option<String>,
}

impl OutgoingEmail {
    fn to_message(&self) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(self.from.parse::<Mailbox>()?)
            .subject(self.subject.as_str());
        for to in &self.to {
            builder = builder.to(to.parse::<Mailbox>()?);
        }

        let message = match &self.html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                self.text_body.clone(),
                html.clone(),
            )),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(self.text_body.clone()),
        };
        message.map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;

    /// Sends each message in order, stopping at the first failure.
    async fn send_mass(&self, emails: &[OutgoingEmail]) -> Result<usize, MailError> {
        for email in emails {
            self.send(email).await?;
        }
        Ok(emails.len())
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port);
        if let (Some(user), Some(pass)) = (&config.user, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = email.to_message()?;
        self.transport.send(message).await?;
        tracing::info!(to = ?email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        // Build anyway so bad addresses fail the same way they would over SMTP.
        email.to_message()?;
        tracing::info!(
            from = %email.from,
            to = ?email.to,
            subject = %email.subject,
            body = %email.text_body,
            "Email not delivered (no SMTP configured)"
        );
        Ok(())
    }
}

/// Keeps sent messages in memory.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl MemoryMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        email.to_message()?;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}

/// Plain-text rendition of an HTML email body.
pub fn strip_tags(html: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"));
    tag.replace_all(html, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            from: "program@example.com".into(),
            to: vec![to.into()],
            subject: "[Conf] Your proposal".into(),
            text_body: "Accepted!".into(),
            html_body: Some("<p>Accepted!</p>".into()),
        }
    }

    #[test]
    fn strip_tags_removes_markup_and_unescapes() {
        assert_eq!(
            strip_tags("<p>Hello <b>Ada</b> &amp; co</p>\n<br/>"),
            "Hello Ada & co\n"
        );
    }

    #[test]
    fn builds_multipart_message() {
        assert!(email("speaker@example.com").to_message().is_ok());
    }

    #[test]
    fn rejects_bad_address() {
        let err = email("not-an-email").to_message().unwrap_err();
        assert!(err.to_string().contains("Email address parse error"));
    }

    #[tokio::test]
    async fn memory_mailer_records_each_message() {
        let mailer = MemoryMailer::default();
        let sent = mailer
            .send_mass(&[email("a@example.com"), email("b@example.com")])
            .await
            .unwrap();
        assert_eq!(sent, 2);
        let recorded = mailer.sent();
        assert_eq!(recorded[0].to, vec!["a@example.com".to_string()]);
        assert_eq!(recorded[1].to, vec!["b@example.com".to_string()]);
    }

    #[tokio::test]
    async fn mass_send_stops_at_first_failure() {
        let mailer = MemoryMailer::default();
        let result = mailer
            .send_mass(&[email("a@example.com"), email("broken"), email("c@example.com")])
            .await;
        assert!(result.is_err());
        assert_eq!(mailer.sent().len(), 1);
    }
}
