use snafu::Snafu;

use crate::error_kind::ErrorKind;

#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum AdminError {
    #[snafu(display("{resource} not found: {message}"))]
    NotFound {
        resource: &'static str,
        message: String,
    },
    #[snafu(display("{resource} already exists: {message}"))]
    AlreadyExists {
        resource: &'static str,
        message: String,
    },
    #[snafu(display("invalid {resource} argument: {message}"))]
    InvalidArgument {
        resource: &'static str,
        message: String,
    },
    #[snafu(display("timed out: {message}"))]
    Timeout { message: String },
    #[snafu(display("remote error: status={status}, message={message}"))]
    Remote { status: u16, message: String },
    #[snafu(display("connection error: {message}"))]
    Connection { message: String },
    #[snafu(display("internal error: {message}"))]
    Internal { message: String },
}

pub type Result<T, E = AdminError> = ::std::result::Result<T, E>;

impl AdminError {
    pub fn index_not_found(index: &str) -> Self {
        AdminError::NotFound {
            resource: "index",
            message: index.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AdminError::NotFound { .. })
            || matches!(self, AdminError::Remote { status: 404, .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, AdminError::AlreadyExists { .. })
            || matches!(self, AdminError::Remote { status: 409, .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AdminError::Timeout { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AdminError::NotFound { .. } => ErrorKind::NotFound,
            AdminError::AlreadyExists { .. } => ErrorKind::Conflict,
            AdminError::InvalidArgument { .. } => ErrorKind::Validation,
            AdminError::Timeout { .. } | AdminError::Connection { .. } => ErrorKind::Temporary,
            AdminError::Remote { status, .. } => ErrorKind::from_status(*status),
            AdminError::Internal { .. } => ErrorKind::Internal,
        }
    }
}
