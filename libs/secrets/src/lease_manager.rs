//! Per-secret lease lifecycle
//!
//! A [`LeaseManager`] drives one [`LeaseProvider`] through
//! fetch → periodic renew → invalidate-and-refetch:
//!
//! ```text
//! PENDING --initialize ok-------------------> READY
//! PENDING --initialize err------------------> ERROR
//! READY   --renew ok------------------------> READY
//! READY   --renew ok, past grant ceiling----> PENDING (invalidated)
//! READY   --renew ok, no longer renewable---> PENDING at lease expiry
//! READY   --renew err-----------------------> ERROR   (data kept)
//! ERROR   --initialize (caller driven)------> READY | ERROR
//! ```
//!
//! Fetches and renewals for one manager are serialized by an async lock, so
//! there is never more than one provider call in flight per manager.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::wait::{once_with_timeout, WaitError};
use crate::{Lease, LeaseProvider, ProviderKind, SecretsError};

/// Shortest renewal interval a manager will schedule
pub const DEFAULT_MIN_RENEW_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ManagerStatus {
    Pending,
    Ready,
    Error,
}

/// Transition notifications delivered to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    Ready,
    Renewed,
    Error(String),
    Invalidated,
}

/// Receives manager transitions synchronously, after state is updated.
///
/// Observers get a shared reference only; they cannot mutate the manager
/// mid-transition.
pub trait ManagerObserver: Send + Sync {
    fn on_event(&self, manager: &LeaseManager, event: &ManagerEvent);
}

/// Decides whether a renewed lease is too close to its grant's hard ceiling
/// to keep renewing: `(elapsed since grant, lease duration, ceiling)`.
pub type ExpirationPolicy = fn(Duration, Duration, Duration) -> bool;

/// Default policy: the next renewal (half a lease away) would land at or past
/// the ceiling.
pub fn next_renewal_past_ceiling(elapsed: Duration, lease: Duration, ceiling: Duration) -> bool {
    elapsed + lease / 2 >= ceiling
}

/// Observable state of a manager
#[derive(Debug, Clone, PartialEq)]
pub struct LeaseSnapshot {
    pub status: ManagerStatus,
    pub data: Option<Value>,
    pub lease_duration: u64,
    pub renewable: bool,
    pub error: Option<String>,
    granted_at: Option<Instant>,
    max_ttl: Option<Duration>,
}

impl LeaseSnapshot {
    fn pending(renewable: bool) -> Self {
        Self {
            status: ManagerStatus::Pending,
            data: None,
            lease_duration: 0,
            renewable,
            error: None,
            granted_at: None,
            max_ttl: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ManagerStatus::Ready
    }
}

struct RenewalTimer {
    handle: JoinHandle<()>,
    interval: Duration,
}

pub struct LeaseManager {
    name: String,
    correlation_id: Uuid,
    provider: Arc<dyn LeaseProvider>,
    state: watch::Sender<LeaseSnapshot>,
    op_lock: Arc<tokio::sync::Mutex<()>>,
    timer: Mutex<Option<RenewalTimer>>,
    observers: RwLock<Vec<Arc<dyn ManagerObserver>>>,
    min_interval: Duration,
    policy: ExpirationPolicy,
}

impl LeaseManager {
    pub fn new(name: impl Into<String>, provider: Arc<dyn LeaseProvider>) -> Self {
        let (state, _) = watch::channel(LeaseSnapshot::pending(provider.can_renew()));

        Self {
            name: name.into(),
            correlation_id: Uuid::new_v4(),
            provider,
            state,
            op_lock: Arc::new(tokio::sync::Mutex::new(())),
            timer: Mutex::new(None),
            observers: RwLock::new(Vec::new()),
            min_interval: DEFAULT_MIN_RENEW_INTERVAL,
            policy: next_renewal_past_ceiling,
        }
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_expiration_policy(mut self, policy: ExpirationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn add_observer(&self, observer: Arc<dyn ManagerObserver>) {
        self.observers.write().push(observer);
    }

    /// Cache key this manager was created under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn snapshot(&self) -> LeaseSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LeaseSnapshot> {
        self.state.subscribe()
    }

    pub fn status(&self) -> ManagerStatus {
        self.state.borrow().status
    }

    pub fn data(&self) -> Option<Value> {
        self.state.borrow().data.clone()
    }

    pub fn lease_duration(&self) -> u64 {
        self.state.borrow().lease_duration
    }

    pub fn is_renewable(&self) -> bool {
        self.state.borrow().renewable
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Interval of the pending renewal timer, if one is armed
    pub fn scheduled_interval(&self) -> Option<Duration> {
        self.timer
            .lock()
            .as_ref()
            .filter(|timer| !timer.handle.is_finished())
            .map(|timer| timer.interval)
    }

    /// Data of a READY manager
    pub fn ready_data(&self) -> Option<Value> {
        let state = self.state.borrow();
        if state.is_ready() {
            state.data.clone()
        } else {
            None
        }
    }

    /// Fetch the secret unless it is already READY.
    ///
    /// Waits behind any in-flight fetch or renewal. Failures are recorded on
    /// the manager and returned to the caller; the manager does not retry.
    pub async fn initialize(self: &Arc<Self>) -> Result<Value, SecretsError> {
        if let Some(data) = self.ready_data() {
            return Ok(data);
        }

        let guard = Arc::clone(&self.op_lock).lock_owned().await;
        self.initialize_locked(guard).await
    }

    /// Start a background fetch if the manager is not READY and nothing is
    /// in flight. Returns whether a fetch was started.
    pub fn start_initialize(self: &Arc<Self>) -> bool {
        if self.status() == ManagerStatus::Ready {
            return false;
        }

        let Ok(guard) = Arc::clone(&self.op_lock).try_lock_owned() else {
            return false;
        };

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            // recorded on the manager and reported to observers
            let _ = manager.initialize_locked(guard).await;
        });
        true
    }

    /// Wait up to `timeout` for the manager to become READY
    pub async fn wait_ready(&self, timeout: Duration) -> Result<Value, WaitError> {
        once_with_timeout(self.subscribe(), "ready", timeout, LeaseSnapshot::is_ready).await?;
        self.ready_data().ok_or(WaitError::TimedOut("ready"))
    }

    /// Reset to PENDING and have the provider drop its cached value
    pub fn invalidate(&self) {
        self.cancel_timer();
        self.state.send_modify(|state| {
            state.status = ManagerStatus::Pending;
            state.data = None;
            state.lease_duration = 0;
            state.error = None;
            state.granted_at = None;
            state.max_ttl = None;
        });
        self.provider.invalidate();
        self.notify(&ManagerEvent::Invalidated);
    }

    async fn initialize_locked(
        self: &Arc<Self>,
        _guard: OwnedMutexGuard<()>,
    ) -> Result<Value, SecretsError> {
        // another caller may have finished while we waited for the lock
        if let Some(data) = self.ready_data() {
            return Ok(data);
        }

        match self.provider.initialize().await {
            Ok(lease) => Ok(self.apply_initialized(lease)),
            Err(err) => {
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    fn apply_initialized(self: &Arc<Self>, lease: Lease) -> Value {
        let was_ready = self.status() == ManagerStatus::Ready;
        let renewable = self.lease_renewable(&lease);
        let data = lease.data;

        self.state.send_modify(|state| {
            state.status = ManagerStatus::Ready;
            state.data = Some(data.clone());
            state.lease_duration = lease.lease_duration;
            state.renewable = renewable;
            state.error = None;
            state.granted_at = Some(Instant::now());
            state.max_ttl = lease.max_ttl.map(Duration::from_secs);
        });

        if !was_ready {
            self.notify(&ManagerEvent::Ready);
        }

        self.cancel_timer();
        self.arm_renewal();
        data
    }

    fn apply_renewed(self: &Arc<Self>, lease: Lease) {
        let renewable = self.lease_renewable(&lease);

        self.state.send_modify(|state| {
            if !lease.data.is_null() {
                state.data = Some(lease.data);
            }
            state.status = ManagerStatus::Ready;
            state.lease_duration = lease.lease_duration;
            state.renewable = renewable;
            state.error = None;
        });
        self.notify(&ManagerEvent::Renewed);

        if self.nearing_expiration() {
            self.invalidate();
            return;
        }

        if !renewable {
            self.arm_expiry();
            return;
        }

        self.arm_renewal();
    }

    fn record_failure(&self, err: &SecretsError) {
        let message = err.to_string();

        self.cancel_timer();
        self.state.send_modify(|state| {
            if state.status != ManagerStatus::Ready {
                state.data = None;
                state.lease_duration = 0;
            }
            state.status = ManagerStatus::Error;
            state.error = Some(message.clone());
        });
        self.notify(&ManagerEvent::Error(message));
    }

    fn lease_renewable(&self, lease: &Lease) -> bool {
        self.provider.can_renew() && lease.renewable != Some(false)
    }

    fn nearing_expiration(&self) -> bool {
        let state = self.state.borrow();
        match (state.granted_at, state.max_ttl) {
            (Some(granted_at), Some(ceiling)) => (self.policy)(
                granted_at.elapsed(),
                Duration::from_secs(state.lease_duration),
                ceiling,
            ),
            _ => false,
        }
    }

    fn renewal_interval(&self, lease_duration: u64) -> Duration {
        let mut interval = Duration::from_millis(lease_duration.saturating_mul(1000) / 2);
        if let Some(ceiling) = self.provider.renew_ceiling() {
            interval = interval.min(ceiling);
        }
        interval.max(self.min_interval)
    }

    fn arm_renewal(self: &Arc<Self>) {
        let (ready, renewable, lease_duration) = {
            let state = self.state.borrow();
            (state.is_ready(), state.renewable, state.lease_duration)
        };
        if !ready || !renewable {
            return;
        }

        let mut timer = self.timer.lock();
        if timer.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return;
        }

        let interval = self.renewal_interval(lease_duration);
        let manager: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            if let Some(manager) = manager.upgrade() {
                manager.run_renewal().await;
            }
        });

        *timer = Some(RenewalTimer { handle, interval });
    }

    /// Invalidate once the current lease runs out; used when the backend
    /// stops allowing renewal of a grant we were renewing
    fn arm_expiry(self: &Arc<Self>) {
        let lease_duration = self.lease_duration();

        let mut timer = self.timer.lock();
        if timer.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return;
        }

        let interval = Duration::from_secs(lease_duration).max(self.min_interval);
        let manager: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            if let Some(manager) = manager.upgrade() {
                manager.run_expiry().await;
            }
        });

        *timer = Some(RenewalTimer { handle, interval });
    }

    async fn run_expiry(self: Arc<Self>) {
        let _guard = Arc::clone(&self.op_lock).lock_owned().await;
        self.timer.lock().take();

        let expired = {
            let state = self.state.borrow();
            state.is_ready() && !state.renewable
        };
        if expired {
            self.invalidate();
        }
    }

    async fn run_renewal(self: Arc<Self>) {
        let _guard = Arc::clone(&self.op_lock).lock_owned().await;

        // this timer has fired: free the slot without aborting ourselves
        self.timer.lock().take();

        {
            let state = self.state.borrow();
            if !state.is_ready() || !state.renewable {
                return;
            }
        }

        match self.provider.renew().await {
            Ok(lease) => self.apply_renewed(lease),
            Err(err) => self.record_failure(&err),
        }
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.handle.abort();
        }
    }

    fn notify(&self, event: &ManagerEvent) {
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.on_event(self, event);
        }
    }
}

impl Drop for LeaseManager {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.handle.abort();
        }
    }
}

impl std::fmt::Debug for LeaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("LeaseManager")
            .field("name", &self.name)
            .field("provider", &self.provider.kind())
            .field("status", &state.status)
            .field("lease_duration", &state.lease_duration)
            .field("renewable", &state.renewable)
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}
