use thiserror::Error;

use crate::registry::Rejected;

/// Failure of a single backend call.
///
/// `Cancelled` belongs to the network class: the transport was told to stop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("server returned {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Remote { status: u16, detail: Option<String> },
    #[error("network error: {0}")]
    Network(String),
    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    /// Text shown to the user. Server detail is passed through verbatim.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ClientError::Validation(message) => message.clone(),
            ClientError::Remote {
                detail: Some(detail),
                ..
            } if !detail.trim().is_empty() => detail.clone(),
            ClientError::Remote { .. } => fallback.to_string(),
            ClientError::Network(_) | ClientError::Cancelled => {
                format!("{fallback}: the server could not be reached")
            }
        }
    }
}

/// Why a user intent did not turn into a backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error(transparent)]
    AlreadyBusy(#[from] Rejected),
    #[error("no content has been scraped yet")]
    NoContent,
    #[error("{0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::ClientError;

    #[test]
    fn remote_detail_is_verbatim() {
        let err = ClientError::Remote {
            status: 400,
            detail: Some("No content found".to_string()),
        };
        assert_eq!(err.user_message("Failed to get answer"), "No content found");
    }

    #[test]
    fn remote_without_detail_uses_fallback() {
        let err = ClientError::Remote {
            status: 500,
            detail: None,
        };
        assert_eq!(err.user_message("Failed to scrape URLs"), "Failed to scrape URLs");
    }

    #[test]
    fn network_errors_are_generic() {
        let err = ClientError::Network("connection refused (os error 111)".to_string());
        let text = err.user_message("Failed to load URLs");
        assert!(text.starts_with("Failed to load URLs"));
        assert!(!text.contains("os error"));
    }
}
