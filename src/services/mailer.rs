//! Outbound mail transports
//!
//! Services talk to a [`Mailer`]; the concrete transport is picked from the
//! `mail` config section. Tests use [`MemoryMailer`] to inspect the outbox.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::{Arc, Mutex};

use crate::config::{MailBackend, MailConfig};

/// A single plain-text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub subject: String,
    pub body: String,
    pub from: String,
    pub to: Vec<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Build the transport selected by configuration
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.backend {
        MailBackend::Console => Ok(Arc::new(ConsoleMailer)),
        MailBackend::Smtp => Ok(Arc::new(SmtpMailer::new(config)?)),
    }
}

/// Delivers through an SMTP relay with lettre's async transport
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let host = config
            .smtp_host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| anyhow!("SMTP host not configured"))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn build_message(mail: &OutgoingMail) -> Result<Message> {
    let from: Mailbox = mail
        .from
        .parse()
        .map_err(|e| anyhow!("Invalid from address '{}': {}", mail.from, e))?;

    let mut builder = Message::builder()
        .from(from)
        .subject(mail.subject.clone())
        .header(ContentType::TEXT_PLAIN);

    for to in &mail.to {
        let mailbox: Mailbox = to
            .parse()
            .map_err(|e| anyhow!("Invalid recipient address '{}': {}", to, e))?;
        builder = builder.to(mailbox);
    }

    builder
        .body(mail.body.clone())
        .map_err(|e| anyhow!("Failed to build email: {}", e))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let message = build_message(mail)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))
            .context("SMTP delivery failed")?;
        Ok(())
    }
}

/// Writes every message to the log instead of delivering it
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        build_message(mail)?;
        tracing::info!(
            from = %mail.from,
            to = ?mail.to,
            subject = %mail.subject,
            "Outgoing email\n{}",
            mail.body
        );
        Ok(())
    }
}

/// In-process outbox
#[derive(Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<OutgoingMail>>,
    fail_after: Option<usize>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` messages, then fail every later send
    pub fn failing_after(n: usize) -> Self {
        Self {
            outbox: Mutex::new(Vec::new()),
            fail_after: Some(n),
        }
    }

    /// Snapshot of everything sent so far
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let mut outbox = self.outbox.lock().unwrap_or_else(|e| e.into_inner());
        if self.fail_after.is_some_and(|limit| outbox.len() >= limit) {
            return Err(anyhow!("mail transport unavailable"));
        }
        outbox.push(mail.clone());
        Ok(())
    }
}
