use serde::{Deserialize, Serialize};

pub mod unit_of_work;
pub use unit_of_work::{UnitOfWork, UnitOfWorkState};

/// Error codes for structured error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Lookup (2xxx)
    NotFound = 2001,
    AmbiguousResult = 2002,

    // Data & Persistence (4xxx)
    RepositoryError = 4001,
    DatabaseConstraintViolation = 4002,
    ConcurrencyConflict = 4003,
    MappingError = 4004,

    // Infrastructure (5xxx)
    ConnectionError = 5001,
    ConfigurationError = 5002,

    // Validation (6xxx)
    InvalidArgument = 6001,
    InvalidOperation = 6002,
}

impl ErrorCode {
    /// Get error code as integer
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get error severity
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ErrorCode::NotFound | ErrorCode::InvalidArgument => ErrorSeverity::Info,

            ErrorCode::AmbiguousResult
            | ErrorCode::ConcurrencyConflict
            | ErrorCode::InvalidOperation
            | ErrorCode::ConnectionError => ErrorSeverity::Warning,

            ErrorCode::RepositoryError
            | ErrorCode::DatabaseConstraintViolation
            | ErrorCode::MappingError => ErrorSeverity::Error,

            ErrorCode::ConfigurationError => ErrorSeverity::Critical,
        }
    }

    /// Check if error is recoverable
    ///
    /// Nothing in this crate retries; the flag only tells callers which
    /// failures are worth retrying on their side.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ConnectionError | ErrorCode::ConcurrencyConflict
        )
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous result: {0}")]
    AmbiguousResult(String),

    #[error("Concurrency conflict: {0}")]
    Concurrency(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DomainError {
    /// Get error code
    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            DomainError::InvalidOperation(_) => ErrorCode::InvalidOperation,
            DomainError::NotFound(_) => ErrorCode::NotFound,
            DomainError::AmbiguousResult(_) => ErrorCode::AmbiguousResult,
            DomainError::Concurrency(_) => ErrorCode::ConcurrencyConflict,
            DomainError::ConstraintViolation(_) => ErrorCode::DatabaseConstraintViolation,
            DomainError::Connection(_) => ErrorCode::ConnectionError,
            DomainError::Repository(_) => ErrorCode::RepositoryError,
            DomainError::Mapping(_) => ErrorCode::MappingError,
            DomainError::Configuration(_) => ErrorCode::ConfigurationError,
        }
    }

    /// Get error message
    pub fn message(&self) -> &str {
        match self {
            DomainError::InvalidArgument(msg)
            | DomainError::InvalidOperation(msg)
            | DomainError::NotFound(msg)
            | DomainError::AmbiguousResult(msg)
            | DomainError::Concurrency(msg)
            | DomainError::ConstraintViolation(msg)
            | DomainError::Connection(msg)
            | DomainError::Repository(msg)
            | DomainError::Mapping(msg)
            | DomainError::Configuration(msg) => msg,
        }
    }

    /// Get error severity
    pub fn severity(&self) -> ErrorSeverity {
        self.code().severity()
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        self.code().is_recoverable()
    }

    /// Format error with code
    pub fn format_with_code(&self) -> String {
        format!("[{}] {}", self.code().code(), self)
    }
}
