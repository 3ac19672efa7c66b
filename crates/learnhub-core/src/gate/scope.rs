use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::auth::Session;

/// Lifetime of one rendered view.
///
/// Results of requests started by the view are only applied while the view
/// is open and the session it was opened under is still current. Dropping
/// the scope closes it.
pub struct ViewScope {
    token: ScopeToken,
    on_close: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

/// Cloneable handle given to the tasks a view spawns.
#[derive(Clone)]
pub struct ScopeToken {
    session: Session,
    epoch: u64,
    open: Arc<AtomicBool>,
}

impl ViewScope {
    pub fn open(session: &Session) -> Self {
        Self {
            token: ScopeToken {
                session: session.clone(),
                epoch: session.epoch(),
                open: Arc::new(AtomicBool::new(true)),
            },
            on_close: Mutex::new(Vec::new()),
        }
    }

    pub fn token(&self) -> ScopeToken {
        self.token.clone()
    }

    pub fn is_live(&self) -> bool {
        self.token.is_live()
    }

    /// Run `hook` when the view closes, e.g. to stop a poller the view
    /// started. Runs immediately if the view is already closed.
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        if self.token.open.load(Ordering::SeqCst) {
            self.on_close
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(Box::new(hook));
        } else {
            hook();
        }
    }

    pub fn close(&self) {
        if !self.token.open.swap(false, Ordering::SeqCst) {
            return;
        }
        let hooks = std::mem::take(&mut *self.on_close.lock().unwrap_or_else(|e| e.into_inner()));
        for hook in hooks {
            hook();
        }
    }

    pub async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        self.token.guard(fut).await
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.close();
    }
}

impl ScopeToken {
    pub fn is_live(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.session.is_current(self.epoch)
    }

    /// Await `fut` and return its output, or `None` if the view closed or
    /// the session changed while it was pending.
    pub async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        let output = fut.await;
        if self.is_live() {
            Some(output)
        } else {
            debug!("Discarding result for a closed or stale view");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{EndReason, MemoryCredentialStore};

    fn session() -> Session {
        Session::new(Arc::new(MemoryCredentialStore::new()))
    }

    #[tokio::test]
    async fn test_guard_passes_results_while_live() {
        let session = session();
        let scope = ViewScope::open(&session);
        assert_eq!(scope.guard(async { 42 }).await, Some(42));
    }

    #[tokio::test]
    async fn test_guard_discards_after_close() {
        let session = session();
        let scope = ViewScope::open(&session);
        let token = scope.token();
        drop(scope);

        assert!(!token.is_live());
        assert_eq!(token.guard(async { 42 }).await, None);
    }

    #[test]
    fn test_close_hooks_run_once() {
        use std::sync::atomic::AtomicUsize;

        let session = session();
        let scope = ViewScope::open(&session);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        scope.on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scope.close();
        scope.close();
        drop(scope);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_guard_discards_after_session_ends_mid_flight() {
        let session = session();
        let scope = ViewScope::open(&session);

        let ender = session.clone();
        let result = scope
            .guard(async move {
                ender.end(EndReason::Unauthorized);
                "courses"
            })
            .await;

        assert_eq!(result, None);
        assert!(!scope.is_live());
    }
}
