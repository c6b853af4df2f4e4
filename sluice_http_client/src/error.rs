use reqwest::StatusCode;
use sluice_ingest_core::{AdminError, TransportError};
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum HttpClusterClientError {
    #[snafu(display("Request error"))]
    Request { source: reqwest::Error },
    #[snafu(display("Response error: status={status}, message={message}"))]
    Response { status: StatusCode, message: String },
}

pub type Result<T, E = HttpClusterClientError> = std::result::Result<T, E>;

impl HttpClusterClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpClusterClientError::Request { source } => source.status(),
            HttpClusterClientError::Response { status, .. } => Some(*status),
        }
    }

    fn request_message(source: &reqwest::Error) -> String {
        match std::error::Error::source(source) {
            Some(cause) => format!("{source}: {cause}"),
            None => source.to_string(),
        }
    }
}

impl From<HttpClusterClientError> for AdminError {
    fn from(error: HttpClusterClientError) -> Self {
        match error {
            HttpClusterClientError::Request { ref source } if source.is_decode() => {
                AdminError::Internal {
                    message: HttpClusterClientError::request_message(source),
                }
            }
            HttpClusterClientError::Request { source } => AdminError::Connection {
                message: HttpClusterClientError::request_message(&source),
            },
            HttpClusterClientError::Response { status, message } => AdminError::Remote {
                status: status.as_u16(),
                message,
            },
        }
    }
}

impl From<HttpClusterClientError> for TransportError {
    fn from(error: HttpClusterClientError) -> Self {
        match error {
            HttpClusterClientError::Request { ref source } if source.is_decode() => {
                TransportError::MalformedResponse {
                    message: HttpClusterClientError::request_message(source),
                }
            }
            HttpClusterClientError::Request { source } => TransportError::Connection {
                message: HttpClusterClientError::request_message(&source),
            },
            HttpClusterClientError::Response { status, message } => TransportError::Remote {
                status: status.as_u16(),
                message,
            },
        }
    }
}
