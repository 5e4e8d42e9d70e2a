use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{debug, info};

use super::Sink;
use crate::config::{BodyFormat, EmailConfig};
use crate::error::SinkError;
use crate::format::FormattedAlert;

pub struct EmailSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    format: BodyFormat,
}

impl EmailSink {
    pub fn new(config: &EmailConfig) -> Result<Self, SinkError> {
        if config.to.is_empty() {
            return Err(SinkError::Config("email sink needs at least one recipient".to_string()));
        }

        let from: Mailbox = config.from.parse()?;
        let to = config
            .to
            .iter()
            .map(|addr| addr.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };
        let mut builder = builder.port(config.smtp_port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        debug!(
            "Email sink using {}:{} (starttls: {}) for {} recipient(s)",
            config.smtp_host,
            config.smtp_port,
            config.starttls,
            to.len()
        );

        Ok(Self {
            transport: builder.build(),
            from,
            to,
            format: config.format,
        })
    }

    pub fn build_message(&self, alert: &FormattedAlert) -> Result<Message, SinkError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(alert.subject());
        for to in &self.to {
            builder = builder.to(to.clone());
        }

        let message = match self.format {
            BodyFormat::Html => builder.header(ContentType::TEXT_HTML).body(alert.html_body())?,
            BodyFormat::Text => builder.header(ContentType::TEXT_PLAIN).body(alert.text_body())?,
        };
        Ok(message)
    }
}

#[async_trait]
impl Sink for EmailSink {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, alert: &FormattedAlert) -> Result<(), SinkError> {
        let message = self.build_message(alert)?;
        let response = self.transport.send(message).await?;
        info!(
            "Email sent for alert {} to {} recipient(s): {}",
            alert.alert_id,
            self.to.len(),
            response.code()
        );
        Ok(())
    }
}
