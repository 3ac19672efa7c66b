use reqwest::StatusCode;
use thiserror::Error;

use crate::models::ApiMessage;
use crate::utils::truncate_string;

/// Failure of a call made through the [`Gateway`](super::Gateway).
///
/// Only `Authentication` has a session side effect (the gateway forces a
/// logout before returning it). Every other variant leaves the session alone
/// and is meant to be shown by the calling view.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    Authentication(String),

    #[error("{message}")]
    Validation { status: u16, message: String },

    #[error("Server error: {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Message used when a 401 carries no server message
const DEFAULT_AUTH_MESSAGE: &str = "Authorization required";

impl GatewayError {
    /// Classify a non-success response.
    ///
    /// The server's `{message}` is preferred; otherwise the message is
    /// `Error <code>: <reason>`.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let server_message = serde_json::from_str::<ApiMessage>(body)
            .ok()
            .and_then(|m| m.message)
            .filter(|m| !m.trim().is_empty())
            .map(|m| truncate_string(&m, MAX_ERROR_BODY_LENGTH));
        let fallback = || {
            format!(
                "Error {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown status")
            )
        };

        match status.as_u16() {
            401 => GatewayError::Authentication(
                server_message.unwrap_or_else(|| DEFAULT_AUTH_MESSAGE.to_string()),
            ),
            400..=499 => GatewayError::Validation {
                status: status.as_u16(),
                message: server_message.unwrap_or_else(fallback),
            },
            _ => GatewayError::Server {
                status: status.as_u16(),
                message: server_message.unwrap_or_else(fallback),
            },
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, GatewayError::Authentication(_))
    }

    /// HTTP status that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Authentication(_) => Some(401),
            GatewayError::Validation { status, .. } | GatewayError::Server { status, .. } => {
                Some(*status)
            }
            GatewayError::Network(e) => e.status().map(|s| s.as_u16()),
            GatewayError::InvalidResponse(_) | GatewayError::InvalidRequest(_) => None,
        }
    }
}
