use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    NotFound,
    PoolExhausted,
    SourceUnavailable,
    ContractViolation,
    InvalidArgument,
    Corruption,
    IOError,
    Cancelled,
    ShutdownInProgress,
}

#[derive(Debug, Clone)]
pub struct Status {
    code: Code,
    message: Option<String>,
}

impl Status {
    pub fn new(code: Code, msg: impl Into<String>) -> Self {
        Status {
            code,
            message: Some(msg.into()),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Status::new(Code::NotFound, msg)
    }

    pub fn pool_exhausted(msg: impl Into<String>) -> Self {
        Status::new(Code::PoolExhausted, msg)
    }

    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Status::new(Code::SourceUnavailable, msg)
    }

    pub fn contract_violation(msg: impl Into<String>) -> Self {
        Status::new(Code::ContractViolation, msg)
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Status::new(Code::InvalidArgument, msg)
    }

    pub fn corruption(msg: impl Into<String>) -> Self {
        Status::new(Code::Corruption, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Status::new(Code::IOError, msg)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Status::new(Code::Cancelled, msg)
    }

    pub fn shutdown_in_progress(msg: impl Into<String>) -> Self {
        Status::new(Code::ShutdownInProgress, msg)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == Code::NotFound
    }

    pub fn is_pool_exhausted(&self) -> bool {
        self.code == Code::PoolExhausted
    }

    pub fn is_source_unavailable(&self) -> bool {
        self.code == Code::SourceUnavailable
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == Code::Cancelled
    }

    pub fn is_corruption(&self) -> bool {
        self.code == Code::Corruption
    }

    /// Contract violations are programming errors, never recovered from.
    pub fn is_fatal(&self) -> bool {
        self.code == Code::ContractViolation
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{:?}: {}", self.code, msg),
            None => write!(f, "{:?}", self.code),
        }
    }
}

impl std::error::Error for Status {}

impl From<std::io::Error> for Status {
    fn from(err: std::io::Error) -> Self {
        Status::io_error(err.to_string())
    }
}

impl From<serde_json::Error> for Status {
    fn from(err: serde_json::Error) -> Self {
        Status::corruption(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Status>;
