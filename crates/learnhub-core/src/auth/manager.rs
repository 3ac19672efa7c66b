//! Session lifecycle: boot validation, login, registration, logout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::{CredentialStore, EndReason, Session, SessionError, SessionStatus};
use crate::api::{Gateway, ResourceClient, LOGIN_PATH, PROFILE_PATH, REGISTER_PATH};
use crate::config::Config;
use crate::models::{ApiMessage, LoginRequest, LoginResponse, RegisterRequest, UserProfile};
use crate::refresh::NotificationPoller;

/// Fallback shown when registration succeeds without a server message
const REGISTERED_MESSAGE: &str = "Registration successful";

/// Owns the authentication state machine.
///
/// Built once at startup and shared by reference. Registration never logs
/// the user in; callers follow a successful `register` with `login`.
pub struct SessionManager {
    gateway: Gateway,
    resources: ResourceClient,
    poller: NotificationPoller,
}

impl SessionManager {
    pub fn new(gateway: Gateway, poll_interval: Duration) -> Self {
        let resources = ResourceClient::new(gateway.clone());
        let poller = NotificationPoller::new(resources.clone(), poll_interval);
        Self {
            gateway,
            resources,
            poller,
        }
    }

    /// Wire up a session, gateway, and poller from configuration.
    pub fn from_config(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let session = Session::new(store);
        let gateway = Gateway::new(&config.base_url, config.request_timeout(), session)?;
        Ok(Self::new(gateway, config.poll_interval()))
    }

    pub fn session(&self) -> &Session {
        self.gateway.session()
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn resources(&self) -> &ResourceClient {
        &self.resources
    }

    pub fn poller(&self) -> &NotificationPoller {
        &self.poller
    }

    /// Validate the token left by a previous run.
    ///
    /// No token settles the session as `Unauthenticated`. A token moves the
    /// session to `Checking` while the profile is fetched; any failure
    /// clears the token.
    pub async fn restore(&self) -> SessionStatus {
        let session = self.session();
        let attempt = session.begin();

        let Some(token) = session.stored_token() else {
            session.settle_without_token(attempt);
            return session.status();
        };

        match session.start_checking(attempt, &token, false) {
            Ok(true) => {}
            Ok(false) => return session.status(),
            Err(e) => {
                warn!(error = %e, "Failed to enter checking state");
                session.end_if_current(attempt, EndReason::ValidationFailed);
                return session.status();
            }
        }
        debug!("Validating stored token");

        match self
            .gateway
            .get_with_token::<UserProfile>(PROFILE_PATH, &token)
            .await
        {
            Ok(profile) => {
                if session.authenticate(attempt, &token, profile) {
                    self.poller.start();
                } else {
                    debug!("Stored session validated after being superseded, discarding");
                }
            }
            Err(e) => {
                warn!(error = %e, "Stored token rejected");
                session.end_if_current(attempt, EndReason::ValidationFailed);
            }
        }
        session.status()
    }

    /// Log in and establish a session.
    ///
    /// The most recent call wins: an earlier call that resolves later
    /// returns [`SessionError::Superseded`] without touching the session.
    /// On failure the session is left `Unauthenticated` and the server's
    /// message is returned as-is.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, SessionError> {
        let attempt = self.session().begin();
        info!(email, "Logging in");

        let result = self.try_login(attempt, email, password).await;
        match &result {
            Ok(_) => {}
            Err(SessionError::Superseded) => debug!(email, "Login superseded by a newer attempt"),
            Err(e) => {
                warn!(email, error = %e, "Login failed");
                self.session().end_if_current(attempt, EndReason::LoginFailed);
            }
        }
        result
    }

    async fn try_login(
        &self,
        attempt: u64,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, SessionError> {
        let response: LoginResponse = self
            .gateway
            .post_public(LOGIN_PATH, &LoginRequest { email, password })
            .await?;
        let token = response.access_token;

        if !self.session().start_checking(attempt, &token, true)? {
            return Err(SessionError::Superseded);
        }

        let profile: UserProfile = self.gateway.get_with_token(PROFILE_PATH, &token).await?;

        if !self.session().authenticate(attempt, &token, profile.clone()) {
            return Err(SessionError::Superseded);
        }
        self.poller.start();
        Ok(profile)
    }

    /// Create an account. Leaves the session untouched.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<String, SessionError> {
        let response: Option<ApiMessage> = self
            .gateway
            .post_public(REGISTER_PATH, &RegisterRequest { name, email, password })
            .await?;
        info!(email, "Account registered");
        Ok(response
            .and_then(|r| r.message)
            .unwrap_or_else(|| REGISTERED_MESSAGE.to_string()))
    }

    /// End the session. Synchronous, unconditional, and idempotent.
    pub fn logout(&self) -> bool {
        self.poller.stop();
        self.session().end(EndReason::Logout)
    }
}
