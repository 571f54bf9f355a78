//! Structured error types for preference operations.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Load errors
    MissingLocation,
    FileNotFound,
    MalformedContent,
    DecryptionFailed,

    // Write errors
    ReadOnly,
    EncryptionFailed,
    IoError,

    // Remote fetch errors
    TransportError,
    HttpStatus,
    ParseError,

    // Argument and settings errors
    InvalidArgument,

    InternalError,
}

/// Structured error for preference operations.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PrefsError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl PrefsError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
            details: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn missing_location(what: &str) -> Self {
        Self::new(
            ErrorCode::MissingLocation,
            format!("No backing location set for {}", what),
        )
    }

    pub fn file_not_found(path: &str) -> Self {
        Self::new(ErrorCode::FileNotFound, format!("File not found: {}", path))
            .with_location(path)
    }

    pub fn malformed(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::MalformedContent,
            format!("Malformed preferences content: {}", reason),
        )
    }

    pub fn decryption(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::DecryptionFailed,
            format!("Failed to decrypt preferences: {}", reason),
        )
    }

    pub fn encryption(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EncryptionFailed,
            format!("Failed to encrypt preferences: {}", reason),
        )
    }

    pub fn read_only(what: &str) -> Self {
        Self::new(ErrorCode::ReadOnly, format!("{} is read-only", what))
    }

    pub fn io(path: &str, err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::IoError, format!("I/O error on {}: {}", path, err))
            .with_location(path)
    }

    pub fn transport(uri: &str, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::TransportError,
            format!("Request to {} failed: {}", uri, err),
        )
        .with_location(uri)
    }

    pub fn http_status(uri: &str, status: u16) -> Self {
        Self::new(
            ErrorCode::HttpStatus,
            format!("Request to {} returned status {}", uri, status),
        )
        .with_location(uri)
    }

    pub fn parse(uri: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ParseError,
            format!("Response from {} could not be parsed: {}", uri, reason),
        )
        .with_location(uri)
    }

    pub fn invalid_argument(arg: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::InvalidArgument,
            format!("Invalid argument '{}': {}", arg, reason),
        )
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }

    /// Whether this error happened while talking to the network
    /// (as opposed to interpreting the response).
    pub fn is_transport(&self) -> bool {
        matches!(self.code, ErrorCode::TransportError | ErrorCode::HttpStatus)
    }
}

impl fmt::Display for PrefsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PrefsError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for PrefsError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<PrefsError>() {
            Ok(prefs_err) => prefs_err,
            Err(err) => PrefsError::internal(err),
        }
    }
}

/// Result type for preference operations.
pub type PrefsResult<T> = std::result::Result<T, PrefsError>;
