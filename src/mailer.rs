use anyhow::Context;
use axum::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::config::SmtpConfig;

/// Outbound email as a capability. The auth controller calls this and logs
/// failures without propagating them.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: String) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let from = cfg.from.parse().context("parse SMTP_FROM address")?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .context("smtp relay config")?
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: String) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse().context("parse recipient address")?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .context("build email")?;
        self.transport.send(message).await.context("smtp send")?;
        Ok(())
    }
}

/// Used when SMTP is not configured: logs the mail instead of sending it,
/// so password-reset links still show up in development logs.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html: String) -> anyhow::Result<()> {
        info!(%to, %subject, "smtp not configured; logging email instead of sending");
        debug!(body = %html, "email body");
        Ok(())
    }
}
