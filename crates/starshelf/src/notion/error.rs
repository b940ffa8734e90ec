//! Error types for the Notion mirror store.

use serde::Deserialize;
use thiserror::Error;

use crate::http::HttpError;
use crate::platform::PlatformError;

/// Errors that can occur when interacting with the Notion API.
#[derive(Debug, Error)]
pub enum NotionError {
    /// The request never produced a usable response.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// The response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API answered with a non-success status.
    #[error("Notion API error ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

impl NotionError {
    /// Build an API error from a non-success response body.
    ///
    /// Notion answers `{"object":"error","code":..,"message":..}`; anything
    /// else is kept verbatim as the message.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            #[serde(default)]
            code: String,
            #[serde(default)]
            message: String,
        }

        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) if !parsed.message.is_empty() => Self::Api {
                status,
                code: parsed.code,
                message: parsed.message,
            },
            _ => Self::Api {
                status,
                code: String::new(),
                message: String::from_utf8_lossy(body).into_owned(),
            },
        }
    }

    /// Whether a reconnect and a single retry may succeed.
    ///
    /// A 502 reaches callers as [`HttpError::UpstreamUnavailable`], so API
    /// errors are never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.kind().is_transient(),
            Self::Api { .. } | Self::Json(_) => false,
        }
    }
}

impl From<NotionError> for PlatformError {
    fn from(err: NotionError) -> Self {
        match err {
            NotionError::Http(e) => PlatformError::Transport(e),
            NotionError::Json(e) => PlatformError::decode(e.to_string()),
            NotionError::Api {
                status, message, ..
            } => match status {
                401 | 403 => PlatformError::AuthRequired,
                404 => PlatformError::not_found(message),
                _ => PlatformError::api(status, message),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_notion_error_body() {
        let err = NotionError::from_response(
            400,
            br#"{"object":"error","status":400,"code":"validation_error","message":"Name is not a property"}"#,
        );
        match err {
            NotionError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, "validation_error");
                assert_eq!(message, "Name is not a property");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn keeps_unstructured_body() {
        let err = NotionError::from_response(503, b"<html>Service Unavailable</html>");
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[test]
    fn status_mapping() {
        let auth: PlatformError = NotionError::from_response(401, b"{}").into();
        assert!(matches!(auth, PlatformError::AuthRequired));

        let missing: PlatformError = NotionError::from_response(404, b"gone").into();
        assert!(matches!(missing, PlatformError::NotFound { .. }));

        let gateway: PlatformError =
            NotionError::from(HttpError::UpstreamUnavailable { status: 502 }).into();
        assert!(gateway.is_transient());
        assert!(matches!(
            gateway,
            PlatformError::Transport(HttpError::UpstreamUnavailable { status: 502 })
        ));

        let unavailable: PlatformError = NotionError::from_response(503, b"").into();
        assert!(matches!(unavailable, PlatformError::Api { status: 503, .. }));
        assert!(!unavailable.is_transient());

        let bad: PlatformError = NotionError::from_response(400, b"nope").into();
        assert!(!bad.is_transient());
    }
}
