//! Error types for the Trixel contribution client
//!
//! Lifecycle errors (`NoHome`, `NoExistingConfiguration`) always escalate to
//! whoever creates the client. Per-sensor validation problems are not part of
//! this taxonomy; see [`crate::services::canonicalize::RejectReason`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// Result type alias for contribution client operations
pub type Result<T> = std::result::Result<T, TrixelError>;

/// Error types for contribution client operations
#[derive(Error, Debug)]
pub enum TrixelError {
    /// The host has no usable home location
    #[error("No home location configured")]
    NoHome,

    /// No persisted configuration exists and none can be built
    #[error("No existing client configuration found")]
    NoExistingConfiguration,

    /// The client failed during the startup confirmation window
    #[error("Client failed to start: {0}")]
    NotReady(#[source] Box<TrixelError>),

    /// Authentication against the network was rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Station or sensor registration failed
    #[error("Registration failed: {0}")]
    Registration(String),

    /// Network errors while talking to the lookup or measurement service
    #[error("Network error: {0}")]
    Network(String),

    /// Persistent storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Structured error code for machine-readable error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Setup errors (1000-1099)
    HomeLocationMissing,
    ConfigurationMissing,
    StartupFailed,

    // Network errors (1100-1199)
    InvalidCredentials,
    RegistrationRejected,
    NetworkUnreachable,
    ServiceTimeout,

    // Configuration errors (1200-1299)
    ConfigurationInvalid,
    InvalidInput,

    // Storage errors (1300-1399)
    StorageFailure,
    DataCorrupted,

    // Internal errors (1900-1999)
    InternalError,
}

impl ErrorCode {
    /// Get numeric error code
    pub fn as_number(&self) -> u32 {
        match self {
            ErrorCode::HomeLocationMissing => 1001,
            ErrorCode::ConfigurationMissing => 1002,
            ErrorCode::StartupFailed => 1003,

            ErrorCode::InvalidCredentials => 1101,
            ErrorCode::RegistrationRejected => 1102,
            ErrorCode::NetworkUnreachable => 1103,
            ErrorCode::ServiceTimeout => 1104,

            ErrorCode::ConfigurationInvalid => 1201,
            ErrorCode::InvalidInput => 1202,

            ErrorCode::StorageFailure => 1301,
            ErrorCode::DataCorrupted => 1302,

            ErrorCode::InternalError => 1901,
        }
    }

    /// Get error category
    pub fn category(&self) -> &'static str {
        match self.as_number() {
            1000..=1099 => "setup",
            1100..=1199 => "network",
            1200..=1299 => "configuration",
            1300..=1399 => "storage",
            1900..=1999 => "internal",
            _ => "unknown",
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl TrixelError {
    /// Create an authentication error
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a registration error
    pub fn registration<S: Into<String>>(msg: S) -> Self {
        Self::Registration(msg.into())
    }

    /// Create a network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Create a storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Generic(anyhow::anyhow!(msg.into()))
    }

    /// Wrap a startup failure
    pub fn not_ready(source: TrixelError) -> Self {
        Self::NotReady(Box::new(source))
    }

    /// Map to structured error code
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            TrixelError::NoHome => ErrorCode::HomeLocationMissing,
            TrixelError::NoExistingConfiguration => ErrorCode::ConfigurationMissing,
            TrixelError::NotReady(_) => ErrorCode::StartupFailed,
            TrixelError::Authentication(_) => ErrorCode::InvalidCredentials,
            TrixelError::Registration(_) => ErrorCode::RegistrationRejected,
            TrixelError::Network(_) => ErrorCode::NetworkUnreachable,
            TrixelError::Timeout(_) => ErrorCode::ServiceTimeout,
            TrixelError::Config(_) => ErrorCode::ConfigurationInvalid,
            TrixelError::InvalidInput(_) => ErrorCode::InvalidInput,
            TrixelError::Storage(_) | TrixelError::Io(_) => ErrorCode::StorageFailure,
            TrixelError::Json(_) => ErrorCode::DataCorrupted,
            TrixelError::Generic(_) => ErrorCode::InternalError,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TrixelError::NoHome
            | TrixelError::NoExistingConfiguration
            | TrixelError::Authentication(_) => ErrorSeverity::Critical,
            TrixelError::Config(_)
            | TrixelError::InvalidInput(_)
            | TrixelError::Storage(_)
            | TrixelError::Json(_)
            | TrixelError::NotReady(_) => ErrorSeverity::Error,
            TrixelError::Network(_) | TrixelError::Timeout(_) | TrixelError::Registration(_) => {
                ErrorSeverity::Warning
            }
            TrixelError::Io(_) | TrixelError::Generic(_) => ErrorSeverity::Error,
        }
    }

    /// Whether repeating the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TrixelError::Network(_) | TrixelError::Timeout(_) | TrixelError::Registration(_) => {
                true
            }
            TrixelError::NotReady(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    /// Check if error is authentication-related
    pub fn is_auth_error(&self) -> bool {
        match self {
            TrixelError::Authentication(_) => true,
            TrixelError::NotReady(inner) => inner.is_auth_error(),
            _ => false,
        }
    }

    /// Error key reported back to the setup form
    pub fn setup_error_key(&self) -> &'static str {
        match self {
            TrixelError::NotReady(inner) => inner.setup_error_key(),
            TrixelError::Authentication(_) => "invalid_auth",
            TrixelError::NoHome => "no_home",
            TrixelError::Registration(_) | TrixelError::Network(_) | TrixelError::Timeout(_) => {
                "cannot_connect"
            }
            _ => "unknown",
        }
    }
}

/// Error reporter for structured logging
pub struct ErrorReporter;

impl ErrorReporter {
    /// Log an error with its code and the operation that produced it
    pub fn log_error(err: &TrixelError, component: &str, operation: &str) {
        let code = err.to_error_code();
        match err.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => error!(
                error_code = code.as_number(),
                category = code.category(),
                component,
                operation,
                "{err}"
            ),
            ErrorSeverity::Warning | ErrorSeverity::Info => warn!(
                error_code = code.as_number(),
                category = code.category(),
                component,
                operation,
                "{err}"
            ),
        }
    }
}
