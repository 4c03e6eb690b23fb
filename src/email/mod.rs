//! Email sending: message descriptor, transport seam, and SMTP transport
//! built from the stored configuration row.

pub mod notify;
pub mod templates;

use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use thiserror::Error;

use crate::db::models::SmtpSettings;

/// A fully resolved outgoing message: who it is from, who it goes to, and
/// the rendered HTML body.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
}

/// Trait seam for sending mail so dispatch logic can be exercised against a
/// recording or failing transport in tests.
pub trait Mailer: Send + Sync {
    fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Production mailer backed by lettre's SMTP transport.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    /// Build a transport from the stored settings row.
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let creds = Credentials::new(settings.username.clone(), settings.password.clone());

        let transport = SmtpTransport::relay(&settings.host)?
            .port(settings.port as u16)
            .credentials(creds)
            .build();

        Ok(Self { transport })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(email.from.parse()?)
            .to(email.to.parse()?)
            .subject(&email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())?;

        self.transport.send(&message)?;
        Ok(())
    }
}

/// The From header for outgoing mail, with the optional display name.
pub fn from_address(settings: &SmtpSettings) -> String {
    match &settings.from_name {
        Some(name) => format!("{} <{}>", name, settings.from_email),
        None => settings.from_email.clone(),
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> SmtpSettings {
    use chrono::Utc;
    SmtpSettings {
        id: uuid::Uuid::new_v4(),
        host: "smtp.example.com".to_string(),
        port: 465,
        username: "mailer".to_string(),
        password: "secret".to_string(),
        from_email: "noreply@example.com".to_string(),
        from_name: Some("Facade Co".to_string()),
        admin_email: "sales@example.com".to_string(),
        is_active: true,
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_address_includes_display_name() {
        let settings = test_settings();
        assert_eq!(from_address(&settings), "Facade Co <noreply@example.com>");
    }

    #[test]
    fn test_from_address_plain_without_name() {
        let mut settings = test_settings();
        settings.from_name = None;
        assert_eq!(from_address(&settings), "noreply@example.com");
    }
}
