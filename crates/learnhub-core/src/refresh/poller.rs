use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::ResourceClient;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Keeps the unread notification count fresh while the session is
/// authenticated.
///
/// At most one polling task runs at a time. The task is stopped by `stop`,
/// by the session ending (through a session end hook), and when the last
/// handle is dropped.
#[derive(Clone)]
pub struct NotificationPoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    resources: ResourceClient,
    interval: Duration,
    count: Arc<watch::Sender<u64>>,
    ticks: Arc<AtomicU64>,
    task: Mutex<Option<PollTask>>,
    /// Set while a session end hook for this poller is registered and has
    /// not yet run.
    hook_pending: AtomicBool,
}

struct PollTask {
    handle: JoinHandle<()>,
    /// Cleared on stop so a fetch that completes during abort is discarded.
    live: Arc<AtomicBool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl NotificationPoller {
    pub fn new(resources: ResourceClient, interval: Duration) -> Self {
        let (count, _) = watch::channel(0);
        Self {
            inner: Arc::new(PollerInner {
                resources,
                interval,
                count: Arc::new(count),
                ticks: Arc::new(AtomicU64::new(0)),
                task: Mutex::new(None),
                hook_pending: AtomicBool::new(false),
            }),
        }
    }

    /// Start polling. The first fetch happens immediately.
    ///
    /// Returns `false` without doing anything when the session is not
    /// authenticated or a polling task is already running.
    pub fn start(&self) -> bool {
        let session = self.inner.resources.gateway().session().clone();
        if !session.is_authenticated() {
            debug!("Not starting notification poller, session is not authenticated");
            return false;
        }

        {
            let mut task = lock(&self.inner.task);
            if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
                return false;
            }

            let live = Arc::new(AtomicBool::new(true));
            let handle = tokio::spawn(run(
                self.inner.resources.clone(),
                self.inner.interval,
                self.inner.count.clone(),
                self.inner.ticks.clone(),
                live.clone(),
            ));
            *task = Some(PollTask { handle, live });
        }

        if !self.inner.hook_pending.swap(true, Ordering::SeqCst) {
            let weak: Weak<PollerInner> = Arc::downgrade(&self.inner);
            session.on_end(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.hook_pending.store(false, Ordering::SeqCst);
                    NotificationPoller { inner }.stop();
                }
            });
        }

        // The session may have ended before the hook was registered
        if !session.is_authenticated() {
            self.stop();
            return false;
        }

        info!(
            interval_secs = self.inner.interval.as_secs_f64(),
            "Notification poller started"
        );
        true
    }

    /// Stop polling and reset the published count to zero. Idempotent;
    /// returns whether a task was running.
    pub fn stop(&self) -> bool {
        let stopped = self.inner.stop_task();
        if stopped {
            info!("Notification poller stopped");
        }
        stopped
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.task)
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Latest unread count; zero while stopped.
    pub fn unread_count(&self) -> u64 {
        *self.inner.count.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.count.subscribe()
    }

    /// Number of fetches issued since the poller was created.
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }
}

impl PollerInner {
    fn stop_task(&self) -> bool {
        let task = lock(&self.task).take();
        let stopped = match task {
            Some(task) => {
                task.live.store(false, Ordering::SeqCst);
                task.handle.abort();
                true
            }
            None => false,
        };
        self.count.send_replace(0);
        stopped
    }
}

impl Drop for PollerInner {
    fn drop(&mut self) {
        self.stop_task();
    }
}

async fn run(
    resources: ResourceClient,
    period: Duration,
    count: Arc<watch::Sender<u64>>,
    ticks: Arc<AtomicU64>,
    live: Arc<AtomicBool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if !live.load(Ordering::SeqCst) || !resources.gateway().session().is_authenticated() {
            break;
        }

        ticks.fetch_add(1, Ordering::SeqCst);
        match resources.unread_count().await {
            Ok(unread) => {
                if !live.load(Ordering::SeqCst) {
                    break;
                }
                count.send_replace(unread);
                debug!(unread, "Notification count refreshed");
            }
            Err(e) if e.is_authentication() => {
                debug!("Notification poll rejected, session ended");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh notification count");
            }
        }
    }
}
