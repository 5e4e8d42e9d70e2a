pub mod email;
pub mod work_item;

use async_trait::async_trait;

use crate::config::RelayConfig;
use crate::error::SinkError;
use crate::format::FormattedAlert;

pub use email::EmailSink;
pub use work_item::WorkItemSink;

/// A downstream system that receives formatted alerts.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, alert: &FormattedAlert) -> Result<(), SinkError>;
}

/// Builds the configured sinks in dispatch order: email, then work item.
pub fn build_sinks(config: &RelayConfig) -> Result<Vec<Box<dyn Sink>>, SinkError> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();

    if let Some(email) = &config.email {
        sinks.push(Box::new(EmailSink::new(email)?));
    }
    if let Some(work_item) = &config.work_item {
        sinks.push(Box::new(WorkItemSink::new(work_item)?));
    }

    Ok(sinks)
}
