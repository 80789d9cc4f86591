//! Error types for veratui startup and the terminal front-end
use crate::credentials::CredentialError;

/// Failures that stop the process before or outside the interactive session.
///
/// Errors raised by individual API calls never end up here; the session turns
/// those into per-scope messages.
#[derive(thiserror::Error, Debug)]
pub enum TuiError {
    /// Veracode API client construction error
    #[error("Veracode API error: {0}")]
    VeracodeApi(#[from] veracode_api::VeracodeError),

    /// Credential error
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Terminal or file I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid command line value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Terminal smaller than the layout needs
    #[error("Terminal too small: {width}x{height} (minimum: {min_width}x{min_height})")]
    TerminalTooSmall {
        width: u16,
        height: u16,
        min_width: u16,
        min_height: u16,
    },
}

/// Result type alias for veratui operations
pub type Result<T> = std::result::Result<T, TuiError>;
