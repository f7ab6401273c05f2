//! Mail delivery backends

use crate::config::SmtpConfig;
use crate::error::{JobAlertError, Result};
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::info;
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// Delivers one plain-text message to one recipient.
pub trait Mailer {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}

impl<M: Mailer + ?Sized> Mailer for &M {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        (**self).send(recipient, subject, body)
    }
}

impl<M: Mailer + ?Sized> Mailer for Box<M> {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        (**self).send(recipient, subject, body)
    }
}

/// Parse the configured sender address.
pub fn parse_sender(sender: &str) -> Result<Mailbox> {
    sender
        .parse()
        .map_err(|e| JobAlertError::Configuration(format!("Invalid sender address {:?}: {}", sender, e)))
}

/// Build a plain-text message. Header values are encoded by lettre, so
/// non-ASCII subjects are safe; line breaks in the subject are refused.
fn build_message(sender: &Mailbox, recipient: &str, subject: &str, body: &str) -> Result<Message> {
    let failure = |reason: String| JobAlertError::MailDelivery {
        recipient: recipient.to_string(),
        reason,
    };

    if subject.contains(['\r', '\n']) {
        return Err(failure("subject contains a line break".to_string()));
    }
    let to: Mailbox = recipient
        .parse()
        .map_err(|e| failure(format!("not a valid email address: {}", e)))?;

    Message::builder()
        .from(sender.clone())
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| failure(e.to_string()))
}

/// Sends through an SMTP relay over implicit TLS.
pub struct SmtpMailer {
    sender: Mailbox,
    host: String,
    username: String,
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(sender: Mailbox, settings: &SmtpConfig, password: String) -> Result<Self> {
        let transport = SmtpTransport::relay(&settings.host)
            .map_err(|e| JobAlertError::Configuration(format!("Invalid SMTP relay {}: {}", settings.host, e)))?
            .port(settings.port)
            .credentials(Credentials::new(settings.username.clone(), password))
            .build();

        Ok(Self {
            sender,
            host: settings.host.clone(),
            username: settings.username.clone(),
            transport,
        })
    }

    /// Build from configuration, reading the password from the environment
    /// variable the configuration names.
    pub fn from_config(sender: Mailbox, settings: &SmtpConfig) -> Result<Self> {
        let password = std::env::var(&settings.password_env).map_err(|_| {
            JobAlertError::Configuration(format!(
                "SMTP password variable {} is not set",
                settings.password_env
            ))
        })?;
        Self::new(sender, settings, password)
    }
}

impl fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("sender", &self.sender.to_string())
            .field("host", &self.host)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let message = build_message(&self.sender, recipient, subject, body)?;
        self.transport
            .send(&message)
            .map_err(|e| JobAlertError::MailDelivery {
                recipient: recipient.to_string(),
                reason: e.to_string(),
            })?;

        info!("Sent alert to {} via {}", recipient, self.host);
        Ok(())
    }
}

/// Writes each message as an `.eml` file into an outbox directory, for pickup
/// by whatever actually relays mail on this machine.
pub struct OutboxMailer {
    sender: Mailbox,
    outbox_dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(sender: Mailbox, outbox_dir: impl Into<PathBuf>) -> Self {
        Self {
            sender,
            outbox_dir: outbox_dir.into(),
        }
    }

    fn file_name(recipient: &str) -> String {
        let safe: String = recipient
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        format!("{}-{}.eml", Utc::now().format("%Y%m%dT%H%M%S%.6f"), safe)
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let message = build_message(&self.sender, recipient, subject, body)?;

        let path = self.outbox_dir.join(Self::file_name(recipient));
        fs::create_dir_all(&self.outbox_dir)
            .and_then(|_| fs::write(&path, message.formatted()))
            .map_err(|e| JobAlertError::MailDelivery {
                recipient: recipient.to_string(),
                reason: e.to_string(),
            })?;

        info!("Queued alert for {} in {}", recipient, path.display());
        Ok(())
    }
}

/// Logs messages instead of sending them.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        info!("[dry run] Would send \"{}\" to {} ({} lines)", subject, recipient, body.lines().count());
        log::debug!("[dry run] Body for {}:\n{}", recipient, body);
        Ok(())
    }
}
