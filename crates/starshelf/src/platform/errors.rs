use thiserror::Error;

use crate::http::{ErrorKind, HttpError};

/// Errors that can occur when talking to the source feed or the mirror store.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The remote answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced a usable response.
    #[error(transparent)]
    Transport(#[from] HttpError),

    /// The response body could not be decoded.
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Authentication required or failed.
    #[error("Authentication required")]
    AuthRequired,

    /// Resource not found.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Unexpected/internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlatformError {
    /// Create an API error.
    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an internal error.
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Failure class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(e) => e.kind(),
            _ => ErrorKind::Other,
        }
    }

    /// Whether a reconnect and a single retry may succeed.
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which is useful for errors
/// that carry a multi-line response body.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;
