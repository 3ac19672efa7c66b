//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `CredentialStore`: durable storage for the session token (keychain,
//!   file, or memory)
//! - `Session`: the shared session cell and its state machine
//! - `SessionManager`: boot validation, login, registration, and logout
//!
//! A session starts `Uninitialized`, becomes `Checking` while a token is
//! being validated, and settles as `Authenticated` or `Unauthenticated`.

pub mod credentials;
pub mod error;
pub mod manager;
pub mod session;

pub use credentials::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
};
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{EndReason, Session, SessionSnapshot, SessionStatus};
