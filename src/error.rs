use thiserror::Error;

/// Failure of a single sink delivery.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("invalid sink configuration: {0}")]
    Config(String),

    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build email: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("{sink} sink failed: {source}")]
    Sink {
        sink: &'static str,
        #[source]
        source: SinkError,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// True for errors caused by the caller's request rather than a sink.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingFields(_) | Self::InvalidPayload(_))
    }
}
