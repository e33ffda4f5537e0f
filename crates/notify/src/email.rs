//! SMTP email notifier via `lettre` with TLS support.
//!
//! One message per notification, addressed to every recipient it carries.
//! Supports STARTTLS and implicit TLS (port 465) connections.

use crate::traits::{Notification, Notifier, NotifyError};
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

/// Sends notifications as emails via SMTP.
#[derive(Debug)]
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    /// Build an `EmailNotifier` from SMTP configuration.
    ///
    /// - `smtp_port`: defaults to 587. Port 465 always uses implicit TLS.
    /// - `tls`: `true` enables STARTTLS on other ports; `false` sends in the clear.
    /// - `from`: sender address, also used as the login when `password` is set.
    pub fn from_config(
        smtp_host: &str,
        smtp_port: Option<u16>,
        tls: bool,
        from: &str,
        password: Option<&str>,
    ) -> Result<Self, NotifyError> {
        let from_mailbox: Mailbox = from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let port = smtp_port.unwrap_or(587);

        let mut builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else if tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host).port(port)
        };

        if let Some(password) = password {
            builder = builder.credentials(Credentials::new(
                from_mailbox.email.to_string(),
                password.to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: from_mailbox,
        })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let recipients = parse_recipients(&notification.recipients);
        if recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let mut message_builder = Message::builder().from(self.from.clone());
        for recipient in recipients {
            message_builder = message_builder.to(recipient);
        }

        message_builder
            .subject(&notification.subject)
            .body(notification.body.clone())
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

/// Parse addresses, dropping (and logging) the invalid ones.
fn parse_recipients(addresses: &[String]) -> Vec<Mailbox> {
    addresses
        .iter()
        .filter_map(|addr| match addr.trim().parse::<Mailbox>() {
            Ok(mailbox) => Some(mailbox),
            Err(e) => {
                tracing::warn!(address = %addr, error = %e, "skipping invalid recipient");
                None
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let email = self.build_message(notification)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::info!(
            channel = "email",
            subject = %notification.subject,
            recipients = notification.recipients.len(),
            "notification delivered"
        );

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}

/// Stand-in used when SMTP credentials are not configured. Every send
/// fails with a configuration error.
#[derive(Debug, Default)]
pub struct DisabledNotifier;

#[async_trait::async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Config(
            "email is disabled: SENDER_EMAIL and SENDER_PASSWORD are not set".to_string(),
        ))
    }

    fn channel_name(&self) -> &str {
        "disabled"
    }
}
