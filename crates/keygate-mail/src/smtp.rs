//! SMTP delivery over lettre's async transport.

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use keygate_core::{KeygateError, KeygateResult, Mail, MailDispatcher};

/// SMTP relay configuration. The account address doubles as the
/// authentication username.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub email: String,
    pub password: String,
}

/// STARTTLS SMTP dispatcher with a pooled connection.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> KeygateResult<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .map_err(|e| KeygateError::Mail(format!("smtp relay setup: {e}")))?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.email.clone(), cfg.password.clone()))
            .build();

        Ok(Self { transport })
    }
}

impl MailDispatcher for SmtpMailer {
    async fn send(&self, mail: Mail) -> KeygateResult<()> {
        let mut builder = Message::builder()
            .from(parse_mailbox(&mail.from)?)
            .subject(&mail.subject)
            .header(ContentType::TEXT_HTML);

        for to in &mail.to {
            builder = builder.to(parse_mailbox(to)?);
        }

        let message = builder
            .body(mail.body)
            .map_err(|e| KeygateError::Mail(format!("message build: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| KeygateError::Mail(format!("smtp send: {e}")))?;

        debug!("mail delivered over smtp");
        Ok(())
    }
}

fn parse_mailbox(addr: &str) -> KeygateResult<Mailbox> {
    addr.parse()
        .map_err(|e| KeygateError::Mail(format!("invalid address {addr:?}: {e}")))
}
