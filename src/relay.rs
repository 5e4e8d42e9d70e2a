use log::{debug, error, info, warn};

use crate::alert::AlertPayload;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::format::{FormattedAlert, Formatter};
use crate::sinks::{build_sinks, Sink};

/// Validate, format, then hand the alert to each sink in order. The first
/// failing sink stops the run.
pub struct Relay {
    formatter: Formatter,
    sinks: Vec<Box<dyn Sink>>,
    id_prefix: String,
}

impl Relay {
    pub fn new(
        formatter: Formatter,
        sinks: Vec<Box<dyn Sink>>,
        id_prefix: impl Into<String>,
    ) -> Self {
        Self {
            formatter,
            sinks,
            id_prefix: id_prefix.into(),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let formatter = Formatter::new(&config.pipeline)
            .map_err(|e| RelayError::Config(format!("invalid highlight pattern: {}", e)))?;
        let sinks = build_sinks(config).map_err(|e| RelayError::Config(e.to_string()))?;

        Ok(Self::new(formatter, sinks, config.pipeline.alert_id_prefix.clone()))
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub async fn relay(&self, payload: AlertPayload) -> Result<FormattedAlert, RelayError> {
        let alert = payload.into_alert(&self.id_prefix).inspect_err(|e| {
            warn!("Rejected alert: {}", e);
        })?;

        let formatted = self.formatter.format(&alert);
        info!("Relaying alert {}: {}", formatted.alert_id, formatted.subject());

        if self.sinks.is_empty() {
            warn!("No sinks configured, alert {} was only logged", formatted.alert_id);
            debug!("{}", formatted.text_body());
        }

        for sink in &self.sinks {
            debug!("Delivering alert {} to {}", formatted.alert_id, sink.name());
            if let Err(source) = sink.deliver(&formatted).await {
                error!(
                    "❌ Failed to deliver alert {} to {}: {}",
                    formatted.alert_id,
                    sink.name(),
                    source
                );
                return Err(RelayError::Sink {
                    sink: sink.name(),
                    source,
                });
            }
        }

        info!("✅ Alert {} relayed", formatted.alert_id);
        Ok(formatted)
    }
}
