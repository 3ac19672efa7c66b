//! Shared session state.
//!
//! `Session` is the one mutable cell that every consumer reads: the session
//! manager writes it, the gateway reads the token from it and ends it on a
//! 401, the route gate and the poller observe it. All writes happen inside a
//! short critical section that never spans an `.await`, so a transition is
//! never observed half-applied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::CredentialStore;
use crate::models::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Checking,
    Authenticated,
    Unauthenticated,
}

impl SessionStatus {
    /// Whether the session has finished deciding who the user is.
    pub fn is_settled(&self) -> bool {
        matches!(self, SessionStatus::Authenticated | SessionStatus::Unauthenticated)
    }
}

/// Why a session ended, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Logout,
    Unauthorized,
    ValidationFailed,
    LoginFailed,
}

/// Point-in-time view of the session.
///
/// `profile` is present exactly when the status is `Authenticated`; a token
/// is present only while `Checking` or `Authenticated`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    status: SessionStatus,
    token: Option<String>,
    profile: Option<UserProfile>,
}

impl SessionSnapshot {
    fn uninitialized() -> Self {
        Self {
            status: SessionStatus::Uninitialized,
            token: None,
            profile: None,
        }
    }

    fn checking(token: String) -> Self {
        Self {
            status: SessionStatus::Checking,
            token: Some(token),
            profile: None,
        }
    }

    fn authenticated(token: String, profile: UserProfile) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            token: Some(token),
            profile: Some(profile),
        }
    }

    fn unauthenticated() -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            token: None,
            profile: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

type EndHook = Box<dyn FnOnce() + Send>;

/// Cheap-to-clone handle to the shared session cell.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    state: watch::Sender<SessionSnapshot>,
    store: Arc<dyn CredentialStore>,
    /// Orders login and restore attempts. Advanced by `begin` and by an
    /// explicit `end`; an attempt that is no longer current must not commit.
    attempt: AtomicU64,
    /// Session generation. Advanced whenever an attempt begins or a session
    /// ends for any reason, including a forced logout.
    epoch: AtomicU64,
    transition: Mutex<()>,
    end_hooks: Mutex<Vec<EndHook>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::uninitialized());
        Self {
            inner: Arc::new(SessionInner {
                state,
                store,
                attempt: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                transition: Mutex::new(()),
                end_hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.state.borrow().status
    }

    /// Bearer token of the committed session, if any.
    pub fn token(&self) -> Option<String> {
        self.inner.state.borrow().token.clone()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.inner.state.borrow().profile.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    /// Receiver that wakes on every committed transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    fn is_current_attempt(&self, attempt: u64) -> bool {
        self.inner.attempt.load(Ordering::SeqCst) == attempt
    }

    /// Register a callback that runs synchronously the next time the session
    /// ends. Hooks run once and are then discarded.
    pub fn on_end(&self, hook: impl FnOnce() + Send + 'static) {
        lock(&self.inner.end_hooks).push(Box::new(hook));
    }

    /// Start a new session attempt, superseding any attempt in flight.
    pub(crate) fn begin(&self) -> u64 {
        let _guard = lock(&self.inner.transition);
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.attempt.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Token persisted by a previous run. Storage errors are logged and
    /// treated as "no token".
    pub(crate) fn stored_token(&self) -> Option<String> {
        match self.inner.store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read stored token, starting logged out");
                None
            }
        }
    }

    /// Settle a boot that found no stored token.
    pub(crate) fn settle_without_token(&self, attempt: u64) -> bool {
        let _guard = lock(&self.inner.transition);
        if !self.is_current_attempt(attempt) {
            return false;
        }
        self.inner.state.send_replace(SessionSnapshot::unauthenticated());
        debug!("No stored token, session unauthenticated");
        true
    }

    /// Move to `Checking` with `token`, optionally persisting it first.
    /// Returns `Ok(false)` when `attempt` was superseded.
    pub(crate) fn start_checking(
        &self,
        attempt: u64,
        token: &str,
        persist: bool,
    ) -> anyhow::Result<bool> {
        let _guard = lock(&self.inner.transition);
        if !self.is_current_attempt(attempt) {
            return Ok(false);
        }
        if persist {
            self.inner.store.save(token)?;
        }
        self.inner
            .state
            .send_replace(SessionSnapshot::checking(token.to_string()));
        debug!("Session checking");
        Ok(true)
    }

    /// Promote a `Checking` session to `Authenticated`. Fails when `attempt`
    /// was superseded or the token changed underneath.
    pub(crate) fn authenticate(&self, attempt: u64, token: &str, profile: UserProfile) -> bool {
        let _guard = lock(&self.inner.transition);
        if !self.is_current_attempt(attempt)
            || self.inner.state.borrow().token.as_deref() != Some(token)
        {
            return false;
        }
        info!(user_id = profile.id, email = %profile.email, "Session authenticated");
        self.inner
            .state
            .send_replace(SessionSnapshot::authenticated(token.to_string(), profile));
        true
    }

    /// End the session if `attempt` is still the current attempt.
    pub(crate) fn end_if_current(&self, attempt: u64, reason: EndReason) -> bool {
        let guard = lock(&self.inner.transition);
        if !self.is_current_attempt(attempt) {
            return false;
        }
        self.end_locked(guard, reason)
    }

    /// End the session only if `presented` is still the committed token.
    ///
    /// Used for 401 responses: several requests that were rejected with the
    /// same token end the session once, and a 401 for a token that was
    /// already replaced leaves the newer session alone. A login attempt in
    /// flight is not superseded; it may still commit its own token.
    pub(crate) fn end_if_token(&self, presented: &str) -> bool {
        let guard = lock(&self.inner.transition);
        if self.inner.state.borrow().token.as_deref() != Some(presented) {
            return false;
        }
        self.end_locked(guard, EndReason::Unauthorized)
    }

    /// Unconditionally end the session: clear the stored token, reset to
    /// `Unauthenticated`, and run end hooks. Also supersedes any attempt in
    /// flight. Returns whether anything changed.
    pub fn end(&self, reason: EndReason) -> bool {
        let guard = lock(&self.inner.transition);
        self.inner.attempt.fetch_add(1, Ordering::SeqCst);
        self.end_locked(guard, reason)
    }

    #[cfg(test)]
    pub(crate) fn pending_end_hooks(&self) -> usize {
        lock(&self.inner.end_hooks).len()
    }

    fn end_locked(&self, guard: MutexGuard<'_, ()>, reason: EndReason) -> bool {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "Failed to clear stored token");
        }
        let changed = self.inner.state.send_if_modified(|snapshot| {
            if *snapshot == SessionSnapshot::unauthenticated() {
                false
            } else {
                *snapshot = SessionSnapshot::unauthenticated();
                true
            }
        });
        drop(guard);

        if changed {
            info!(?reason, "Session ended");
        }

        let hooks: Vec<EndHook> = std::mem::take(&mut *lock(&self.inner.end_hooks));
        for hook in hooks {
            hook();
        }
        changed
    }
}
