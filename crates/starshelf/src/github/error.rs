//! Error types for the GitHub source feed.

use thiserror::Error;

use crate::http::HttpError;
use crate::platform::PlatformError;

/// Errors that can occur when interacting with the GitHub API.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// The response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API answered with a non-success status.
    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The GraphQL endpoint answered 200 with an `errors` array.
    #[error("GitHub GraphQL error: {0}")]
    GraphQl(String),

    /// The GraphQL response carried neither data nor errors.
    #[error("GitHub GraphQL response has no data")]
    MissingData,
}

impl From<GitHubError> for PlatformError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Http(e) => PlatformError::Transport(e),
            GitHubError::Json(e) => PlatformError::decode(e.to_string()),
            GitHubError::Api { status, message } => match status {
                401 | 403 => PlatformError::AuthRequired,
                404 => PlatformError::not_found(message),
                502 => PlatformError::Transport(HttpError::UpstreamUnavailable { status }),
                _ => PlatformError::api(status, message),
            },
            GitHubError::GraphQl(message) => PlatformError::api(200, message),
            GitHubError::MissingData => PlatformError::decode("GraphQL response has no data"),
        }
    }
}
