//! Outgoing mail. The only message today is the password reset link.

use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::models::staff::Staff;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("Invalid mailbox {0:?}")]
    Address(String),
}

/// SMTP mailer with a fixed sender.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl Mailer {
    /// Build the STARTTLS transport and parse the sender once.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Address` for a malformed `SMTP_FROM` and
    /// `EmailError::Smtp` if the relay host is unusable.
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let sender = config
            .from_address
            .parse()
            .map_err(|_| EmailError::Address(config.from_address.clone()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.expose_secret().to_string(),
            ))
            .build();

        Ok(Self { transport, sender })
    }

    /// Mail a reset link to a staff member.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be built or the relay refuses it.
    pub async fn send_password_reset(&self, staff: &Staff, link: &str) -> Result<(), EmailError> {
        let message = ResetEmail {
            name: &staff.name,
            address: staff.email.as_str(),
            link,
        }
        .build(self.sender.clone())?;

        self.transport.send(message).await?;
        tracing::info!(staff_id = %staff.id, "Password reset email sent");
        Ok(())
    }
}

struct ResetEmail<'a> {
    name: &'a str,
    address: &'a str,
    link: &'a str,
}

impl ResetEmail<'_> {
    const SUBJECT: &'static str = "Reset your Emporium password";

    fn recipient(&self) -> Result<Mailbox, EmailError> {
        let address = self
            .address
            .parse()
            .map_err(|_| EmailError::Address(self.address.to_string()))?;
        Ok(Mailbox::new(Some(self.name.to_string()), address))
    }

    fn body(&self) -> String {
        format!(
            "Hi {name},\n\n\
             Someone asked to reset the password for your Emporium dashboard account.\n\
             Open the link below within the next hour to choose a new one:\n\n\
             {link}\n\n\
             If you did not ask for this, you can ignore this email.\n",
            name = self.name,
            link = self.link,
        )
    }

    fn build(&self, sender: Mailbox) -> Result<Message, EmailError> {
        Ok(Message::builder()
            .from(sender)
            .to(self.recipient()?)
            .subject(Self::SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(self.body())?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn reset() -> ResetEmail<'static> {
        ResetEmail {
            name: "Asha",
            address: "asha@example.com",
            link: "https://dash.test/reset-password?token=abc",
        }
    }

    #[test]
    fn test_reset_body_contains_link() {
        let body = reset().body();
        assert!(body.starts_with("Hi Asha,"));
        assert!(body.contains("https://dash.test/reset-password?token=abc"));
    }

    #[test]
    fn test_reset_message_headers() {
        let sender: Mailbox = "Emporium <no-reply@example.com>".parse().unwrap();
        let formatted = String::from_utf8(reset().build(sender).unwrap().formatted()).unwrap();
        assert!(formatted.contains("Subject: Reset your Emporium password"));
        assert!(formatted.contains("To: Asha <asha@example.com>"));
    }

    #[test]
    fn test_bad_recipient_is_rejected() {
        let bad = ResetEmail {
            address: "not an address",
            ..reset()
        };
        assert!(matches!(bad.recipient(), Err(EmailError::Address(_))));
    }
}
