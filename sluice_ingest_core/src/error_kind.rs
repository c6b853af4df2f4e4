/// How a caller should react to an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid options or flags
    Configuration,
    /// Rejected input
    Validation,
    NotFound,
    /// Index or resource already exists
    Conflict,
    /// Connection failures, timeouts and server errors. Worth retrying.
    Temporary,
    /// The bulk client no longer accepts work
    Closed,
    Internal,
}

impl ErrorKind {
    /// Classifies the status code of a failed cluster response.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            409 => Self::Conflict,
            408 | 429 => Self::Temporary,
            400..=499 => Self::Validation,
            _ => Self::Temporary,
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Temporary)
    }

    /// sysexits(3) code for a process that fails with this kind.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Configuration => 78,
            Self::Validation => 65,
            Self::NotFound => 66,
            Self::Closed => 69,
            Self::Temporary => 75,
            Self::Conflict | Self::Internal => 70,
        }
    }
}
