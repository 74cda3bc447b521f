//! Outgoing mail: compose from an utterance, deliver over SMTP.

use std::sync::LazyLock;

use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use regex::Regex;
use secrecy::ExposeSecret;

use crate::error::{CollaboratorError, MailboxError};
use crate::mailbox::MailboxConfig;

const DEFAULT_SUBJECT: &str = "Message from your assistant";

static RECIPIENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex")
});

static SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:subject\s*[:=]?\s*"([^"]+)"|about\s+(.+?))(?:\s+(?:saying|that says|with (?:the )?(?:body|message))\b|$)"#,
    )
    .expect("valid regex")
});

static BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\b(?:saying|that says|with (?:the )?(?:body|message))\s*:?\s*(.+)$"#)
        .expect("valid regex")
});

/// A composed message, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Pull recipient, subject and body out of a request such as
/// `send an email to bob@example.com about lunch saying see you at noon`.
pub fn compose(text: &str) -> Result<OutgoingMail, CollaboratorError> {
    let to = RECIPIENT
        .find(text)
        .map(|m| m.as_str().trim_end_matches('.').to_string())
        .ok_or_else(|| {
            CollaboratorError::InvalidInput("Tell me who to send the email to.".into())
        })?;

    let body = BODY
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| clean(m.as_str()))
        .filter(|b| !b.is_empty())
        .ok_or_else(|| {
            CollaboratorError::InvalidInput(
                "Tell me what the email should say, e.g. \"saying ...\".".into(),
            )
        })?;

    let subject = SUBJECT
        .captures(text)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| clean(m.as_str()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

    Ok(OutgoingMail { to, subject, body })
}

fn clean(text: &str) -> String {
    text.trim()
        .trim_matches('"')
        .trim_end_matches(['.', '!'])
        .trim()
        .to_string()
}

/// Deliver over SMTP. Blocking; run in `spawn_blocking`.
///
/// Port 465 uses implicit TLS, anything else STARTTLS.
pub fn send(config: &MailboxConfig, mail: &OutgoingMail) -> Result<(), MailboxError> {
    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );

    let builder = if config.smtp_port == 465 {
        SmtpTransport::relay(&config.smtp_host)
    } else {
        SmtpTransport::starttls_relay(&config.smtp_host)
    }
    .map_err(|e| MailboxError::Send(format!("SMTP relay error: {e}")))?;

    let transport = builder
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    let email = Message::builder()
        .from(
            config
                .from_address
                .parse()
                .map_err(|e| MailboxError::Send(format!("Invalid from address: {e}")))?,
        )
        .to(mail
            .to
            .parse()
            .map_err(|e| MailboxError::Send(format!("Invalid to address: {e}")))?)
        .subject(&mail.subject)
        .body(mail.body.clone())
        .map_err(|e| MailboxError::Send(format!("Failed to build email: {e}")))?;

    transport
        .send(&email)
        .map_err(|e| MailboxError::Send(format!("SMTP send failed: {e}")))?;

    tracing::info!("Email sent to {}", mail.to);
    Ok(())
}
