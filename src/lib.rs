pub mod alert;
pub mod config;
pub mod error;
pub mod format;
pub mod relay;
pub mod server;
pub mod sinks;

pub use alert::{Alert, AlertPayload};
pub use config::RelayConfig;
pub use error::{RelayError, SinkError};
pub use format::{FormattedAlert, Formatter};
pub use relay::Relay;
pub use server::create_router;
pub use sinks::{EmailSink, Sink, WorkItemSink};
