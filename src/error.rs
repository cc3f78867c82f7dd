//! Error types for slidegate.

use thiserror::Error;

/// Main error type for slidegate operations.
///
/// Only construction and configuration can fail; the limiter's admission
/// operations are total and never return an error.
#[derive(Error, Debug)]
pub enum SlidegateError {
    /// The window size is zero, negative or not a finite number
    #[error("Invalid window size: {0}")]
    InvalidWindow(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for slidegate operations.
pub type Result<T> = std::result::Result<T, SlidegateError>;
