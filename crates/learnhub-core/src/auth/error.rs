use thiserror::Error;

use crate::api::GatewayError;

#[derive(Error, Debug)]
pub enum SessionError {
    /// The server or transport rejected the call. Displays the server's
    /// message unchanged.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("A newer login attempt replaced this one")]
    Superseded,

    #[error("Credential storage failed: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl SessionError {
    pub fn is_superseded(&self) -> bool {
        matches!(self, SessionError::Superseded)
    }
}
