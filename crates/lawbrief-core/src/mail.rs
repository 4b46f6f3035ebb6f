use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::MailConfig;

pub use lettre::Message;

pub const REPORT_SUBJECT: &str = "Your Legal Document Report";
pub const REPORT_BODY: &str = "Attached is your legal document report.";
pub const REPORT_FILENAME: &str = "report.pdf";

/// Outbound mail seam; the SMTP relay in production, a fake in tests.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: Message) -> Result<()>;
}

/// STARTTLS SMTP relay authenticated with the sender's credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("configuring SMTP relay {}", config.host))?
            .port(config.port)
            .credentials(Credentials::new(
                config.sender_email.clone(),
                config.sender_password.clone(),
            ))
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: Message) -> Result<()> {
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Result of a delivery attempt. Delivery never raises; failures land in `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn sent() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

pub fn build_report_email(from: &str, to: &str, pdf: Vec<u8>) -> Result<Message> {
    let from: Mailbox = from
        .parse()
        .with_context(|| format!("invalid sender address {from:?}"))?;
    let to: Mailbox = to
        .parse()
        .with_context(|| format!("invalid recipient address {to:?}"))?;
    let pdf_type = ContentType::parse("application/pdf")?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(REPORT_SUBJECT)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(REPORT_BODY.to_string()))
                .singlepart(Attachment::new(REPORT_FILENAME.to_string()).body(pdf, pdf_type)),
        )?;
    Ok(message)
}

/// Build the report email and hand it to the transport.
pub async fn send_report(
    transport: &dyn MailTransport,
    from: &str,
    to: &str,
    pdf: Vec<u8>,
) -> SendOutcome {
    let message = match build_report_email(from, to, pdf) {
        Ok(m) => m,
        Err(e) => {
            warn!(recipient = %to, "could not build report email: {e:#}");
            return SendOutcome::failed(format!("{e:#}"));
        },
    };

    match transport.send(message).await {
        Ok(()) => {
            info!(recipient = %to, "report email sent");
            SendOutcome::sent()
        },
        Err(e) => {
            warn!(recipient = %to, "report email failed: {e:#}");
            SendOutcome::failed(format!("{e:#}"))
        },
    }
}
