//! Outbound email: the reset flow talks to a `Mailer`, never to a transport.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, to: &str, reset_link: &str) -> Result<()>;
}

pub struct EmailService {
    transport: EmailTransport,
    from: Mailbox,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    /// Writes .eml files to a directory instead of sending — for development
    /// and local testing.
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn smtp(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        from: &str,
    ) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .context("Create SMTP transport")?
            .port(port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();

        Ok(Self {
            transport: EmailTransport::Smtp(transport),
            from: parse_mailbox(from)?,
        })
    }

    pub fn file(dir: &Path, from: &str) -> Result<Self> {
        if !dir.exists() {
            std::fs::create_dir_all(dir).context("Create outbox directory")?;
        }
        Ok(Self {
            transport: EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(dir)),
            from: parse_mailbox(from)?,
        })
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(to)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .context("Build email message")?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.context("Send SMTP email")?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.context("Write email file")?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send_password_reset(&self, to: &str, reset_link: &str) -> Result<()> {
        let body = format!(
            "Hello,\n\n\
             A password reset was requested for your account. Open the link\n\
             below within one hour to choose a new password:\n\n\
             {}\n\n\
             If you did not request this, you can safely ignore this email —\n\
             the link expires on its own.\n",
            reset_link
        );
        self.send(to, "Reset your password", body).await
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox> {
    addr.parse::<Mailbox>()
        .with_context(|| format!("Parse email address '{}'", addr))
}
