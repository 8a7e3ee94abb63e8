//! Error types for the request/response core.
//!
//! # Design
//! Failures fall into four families: local construction errors (a request
//! could not be built from the caller's value), transport errors (the round
//! trip itself failed), service errors (a non-2xx response, normalized by
//! [`crate::sdkerr`]) and decode errors. Decode errors surface as
//! `Service` too, carrying the status code and request id of the response
//! that could not be decoded.

use thiserror::Error;

use crate::sdkerr::ServiceResponseError;

pub type Result<T> = std::result::Result<T, SdkError>;

/// Errors returned by the client, invoker and transport.
#[derive(Debug, Error)]
pub enum SdkError {
    /// A mandatory request field was unset.
    #[error("required field `{0}` is missing")]
    RequiredFieldMissing(String),

    /// The request value could not be mapped onto its operation descriptor.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An endpoint string could not be parsed or no endpoint is configured.
    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(String),

    /// The round trip failed before a response was received.
    #[error("transport error: {0}")]
    Transport(#[source] Box<ureq::Error>),

    /// The service answered with a non-2xx status, or the response could not
    /// be decoded.
    #[error(transparent)]
    Service(#[from] ServiceResponseError),

    /// A credentials provider failed to sign the request.
    #[error("credentials error: {0}")]
    Credentials(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SdkError {
    /// Whether this is a DNS resolution failure for the request host.
    ///
    /// Only this failure triggers endpoint failover.
    pub fn is_host_not_found(&self) -> bool {
        match self {
            SdkError::Transport(err) => is_host_not_found(err),
            _ => false,
        }
    }

    /// The normalized service error, if this is one.
    pub fn service_error(&self) -> Option<&ServiceResponseError> {
        match self {
            SdkError::Service(err) => Some(err),
            _ => None,
        }
    }

    /// HTTP status of the failed response, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        self.service_error().map(|err| err.status_code)
    }
}

impl From<ureq::Error> for SdkError {
    fn from(err: ureq::Error) -> Self {
        SdkError::Transport(Box::new(err))
    }
}

fn is_host_not_found(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::HostNotFound => true,
        // The system resolver reports unknown hosts as an uncategorized io
        // error; only its message identifies it.
        ureq::Error::Io(io) => {
            if io.kind() == std::io::ErrorKind::NotFound {
                return true;
            }
            let message = io.to_string().to_ascii_lowercase();
            message.contains("failed to lookup address")
                || message.contains("name or service not known")
                || message.contains("no such host")
                || message.contains("name resolution")
        }
        _ => false,
    }
}
