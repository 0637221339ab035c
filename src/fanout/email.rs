use lettre::{
    message::Mailbox,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    config::SmtpConfig,
    error::{AppError, Result},
};

/// Sends announcement emails. Dispatch is always launched as a detached
/// task by the fanout; a delivery failure is logged, never surfaced.
pub struct EmailDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailDispatcher {
    pub fn new(config: &SmtpConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        let host = config.host.as_deref()?;
        let from = config.from_address.as_deref()?.parse::<Mailbox>().ok()?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host).ok()?;
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Some(Self {
            transport: builder.build(),
            from,
        })
    }

    pub async fn dispatch(&self, title: &str, description: &str, recipients: &[String]) -> Result<()> {
        let body = format!("{}\n\n{}", title, description);

        for recipient in recipients {
            let mailbox = match recipient.parse::<Mailbox>() {
                Ok(mailbox) => mailbox,
                Err(e) => {
                    tracing::warn!("Skipping invalid recipient address {}: {}", recipient, e);
                    continue;
                }
            };

            let message = Message::builder()
                .from(self.from.clone())
                .to(mailbox)
                .subject(format!("New announcement: {}", title))
                .body(body.clone())
                .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

            if let Err(e) = self.transport.send(message).await {
                // Best-effort per recipient; keep going.
                tracing::warn!("Email delivery to {} failed: {}", recipient, e);
            }
        }

        Ok(())
    }
}
