use std::{net::AddrParseError, path::PathBuf};

use sluice_http_client::HttpClusterClientError;
use sluice_ingest_core::{AdminError, ErrorKind, IngestError};
use sluice_observability::ObservabilityError;
use snafu::Snafu;

/// CLI error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CliError {
    #[snafu(display("Invalid {name} argument: {message}"))]
    InvalidArgument { name: &'static str, message: String },
    #[snafu(display("Failed to read {}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Invalid JSON in {}", path.display()))]
    InvalidJsonFile {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[snafu(display("Invalid document at line {line}"))]
    InvalidDocument {
        line: usize,
        source: serde_json::Error,
    },
    #[snafu(display("Invalid server URL"))]
    InvalidServerUrl { source: AddrParseError },
    #[snafu(display("Failed to connect to the cluster"))]
    Connection { source: HttpClusterClientError },
    #[snafu(display("Failed cluster request {operation}"))]
    Cluster {
        operation: &'static str,
        source: HttpClusterClientError,
    },
    #[snafu(display("Failed admin operation {operation}"))]
    Admin {
        operation: &'static str,
        source: AdminError,
    },
    #[snafu(display("Failed ingest operation {operation}"))]
    Ingest {
        operation: &'static str,
        source: IngestError,
    },
    #[snafu(display("Failed to initialize observability"))]
    Observability { source: ObservabilityError },
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

impl CliError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CliError::InvalidArgument { .. }
            | CliError::InvalidJsonFile { .. }
            | CliError::InvalidDocument { .. }
            | CliError::InvalidServerUrl { .. } => ErrorKind::Configuration,
            CliError::ReadFile { .. } | CliError::Io { .. } => ErrorKind::Internal,
            CliError::Connection { .. } | CliError::Cluster { .. } => ErrorKind::Temporary,
            CliError::Admin { source, .. } => source.kind(),
            CliError::Ingest { source, .. } => source.kind(),
            CliError::Observability { .. } => ErrorKind::Internal,
        }
    }
}
