//! learnhub core - session and authorization layer for the learnhub course
//! platform client.
//!
//! The pieces fit together like this:
//!
//! - [`auth::Session`] is the single source of truth for who is signed in.
//! - [`api::Gateway`] attaches the session token to every request and ends
//!   the session when the server rejects it.
//! - [`auth::SessionManager`] validates a stored token at startup and runs
//!   login, registration, and logout.
//! - [`gate`] decides which views may render for the current session.
//! - [`refresh::NotificationPoller`] keeps the unread count fresh while the
//!   user is signed in.

pub mod api;
pub mod auth;
pub mod config;
pub mod gate;
pub mod models;
pub mod refresh;
pub mod utils;

pub use api::{Endpoint, Gateway, GatewayError, ResourceClient};
pub use auth::{
    CredentialStore, EndReason, Session, SessionError, SessionManager, SessionSnapshot,
    SessionStatus,
};
pub use config::{Config, CredentialBackend};
pub use gate::{GateDecision, Navigator, Route, RouteAccess, RouteGate, ViewScope};
pub use refresh::NotificationPoller;
