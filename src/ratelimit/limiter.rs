//! Core fixed-window rate limiter.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::clock::{Clock, SystemClock};
use super::policy::{PolicyError, RateLimitingConfig, WindowPolicy};
use super::window::{Admission, WindowRecord};

/// Name used when a limiter is not given one.
const DEFAULT_NAME: &str = "default";

/// Background sweep task and the channel that stops it.
struct Sweeper {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// A fixed-window request counter keyed by identifier.
///
/// Each identifier gets at most one [`WindowRecord`]. The first request opens
/// a window of `policy.window()`; up to `policy.max_requests` requests are
/// admitted in it, after which requests are rejected (without counting) until
/// the window has passed. A request after that opens a fresh window.
///
/// Being fixed-window, a client can land `max_requests` at the very end of
/// one window and another `max_requests` at the start of the next, so up to
/// twice the nominal limit may pass around a boundary. That is the accepted
/// trade-off of this algorithm.
///
/// Records live in a sharded map; `check` updates an identifier's record
/// under its shard lock, so concurrent requests for one identifier are never
/// both admitted past the limit.
pub struct RateLimiter {
    /// Label used in logs
    name: String,
    /// Window length and request budget
    policy: WindowPolicy,
    /// Window records indexed by identifier
    records: Arc<DashMap<String, WindowRecord>>,
    /// Source of the current instant
    clock: Arc<dyn Clock>,
    /// Periodic sweep, if started
    sweeper: Mutex<Option<Sweeper>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("tracked", &self.records.len())
            .field("sweeping", &self.is_sweeping())
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter on the system clock with no background sweep.
    ///
    /// Fails if the policy has a zero window or a zero request budget.
    pub fn new(policy: WindowPolicy) -> Result<Self, PolicyError> {
        Self::with_clock(policy, Arc::new(SystemClock::new()))
    }

    /// Create a limiter on a custom clock with no background sweep.
    pub fn with_clock(policy: WindowPolicy, clock: Arc<dyn Clock>) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self {
            name: DEFAULT_NAME.to_string(),
            policy,
            records: Arc::new(DashMap::new()),
            clock,
            sweeper: Mutex::new(None),
        })
    }

    /// Set the label used in logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Create a validated limiter and start its periodic sweep.
    ///
    /// Fails with [`PolicyError::NoRuntime`] outside a tokio runtime.
    pub fn start(
        name: &str,
        policy: WindowPolicy,
        clock: Arc<dyn Clock>,
        sweep_interval: Duration,
    ) -> Result<Arc<Self>, PolicyError> {
        if sweep_interval.is_zero() {
            return Err(PolicyError::ZeroSweepInterval);
        }

        let limiter = Self::with_clock(policy, clock)?.named(name);
        limiter.spawn_sweeper(sweep_interval)?;

        info!(
            limiter = %limiter.name,
            window_ms = policy.window_ms,
            max_requests = policy.max_requests,
            sweep_interval_ms = sweep_interval.as_millis() as u64,
            "Rate limiter started"
        );

        Ok(Arc::new(limiter))
    }

    /// Check whether a request from `identifier` is admitted, counting it if so.
    ///
    /// Never fails: every call yields `true` (allowed) or `false` (rejected).
    pub fn check(&self, identifier: &str) -> bool {
        let now = self.clock.now();
        let window = self.policy.window();

        let admission = match self.records.entry(identifier.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(WindowRecord::open(now, window));
                Admission::Allowed
            }
            Entry::Occupied(mut entry) => {
                entry
                    .get_mut()
                    .admit(now, window, self.policy.max_requests)
            }
        };

        if admission.is_allowed() {
            trace!(limiter = %self.name, identifier = %identifier, "Request admitted");
        } else {
            debug!(limiter = %self.name, identifier = %identifier, "Rate limit exceeded");
        }

        admission.is_allowed()
    }

    /// Time until `identifier` may be admitted again, if it is currently blocked.
    pub fn retry_after(&self, identifier: &str) -> Option<Duration> {
        let now = self.clock.now();
        let record = self.records.get(identifier)?;

        if record.is_expired(now) || record.count() < self.policy.max_requests {
            return None;
        }

        Some(record.time_until_reset(now))
    }

    /// Requests `identifier` may still make in its current window.
    pub fn remaining(&self, identifier: &str) -> u32 {
        let now = self.clock.now();
        self.records
            .get(identifier)
            .map(|record| record.remaining(now, self.policy.max_requests))
            .unwrap_or(self.policy.max_requests)
    }

    /// Remove every record whose window has ended. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        sweep_expired(&self.records, self.clock.now())
    }

    /// Stop the periodic sweep and drop all records.
    ///
    /// Waits for the sweep task to finish. Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        let sweeper = self.sweeper.lock().take();

        if let Some(Sweeper { shutdown, task }) = sweeper {
            let _ = shutdown.send(true);
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(limiter = %self.name, error = %e, "Sweep task ended abnormally");
                }
            }
        }

        self.records.clear();
        info!(limiter = %self.name, "Rate limiter shut down");
    }

    /// The policy this limiter enforces.
    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// The limiter's log label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of identifiers currently tracked.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no identifier is tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the periodic sweep task is running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .map(|s| !s.task.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the periodic sweep unless one is already running.
    fn spawn_sweeper(&self, every: Duration) -> Result<(), PolicyError> {
        let runtime = Handle::try_current().map_err(|_| PolicyError::NoRuntime)?;

        let mut slot = self.sweeper.lock();
        if slot.is_some() {
            return Ok(());
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let records = Arc::clone(&self.records);
        let clock = Arc::clone(&self.clock);
        let name = self.name.clone();

        let task = runtime.spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = sweep_expired(&records, clock.now());
                        if removed > 0 {
                            debug!(limiter = %name, removed, "Swept expired rate limit records");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        debug!(limiter = %name, "Sweep task stopping");
                        break;
                    }
                }
            }
        });

        *slot = Some(Sweeper { shutdown, task });
        Ok(())
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            sweeper.task.abort();
        }
    }
}

/// Drop records whose window ended before `now`.
fn sweep_expired(records: &DashMap<String, WindowRecord>, now: std::time::Instant) -> usize {
    let mut removed = 0;
    records.retain(|_, record| {
        let keep = !record.is_sweepable(now);
        if !keep {
            removed += 1;
        }
        keep
    });
    removed
}

/// The two limiters the application runs: sign-in and registration.
///
/// They are independent instances with their own maps and sweeps.
#[derive(Debug, Clone)]
pub struct Limiters {
    /// Throttles sign-in attempts per origin and email
    pub login: Arc<RateLimiter>,
    /// Throttles registration attempts per origin
    pub register: Arc<RateLimiter>,
}

impl Limiters {
    /// Start both limiters on the system clock.
    pub fn start(config: &RateLimitingConfig) -> Result<Self, PolicyError> {
        Self::start_with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Start both limiters on a shared clock.
    pub fn start_with_clock(
        config: &RateLimitingConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PolicyError> {
        config.validate()?;
        let sweep_interval = config.sweep_interval();

        Ok(Self {
            login: RateLimiter::start("login", config.login, Arc::clone(&clock), sweep_interval)?,
            register: RateLimiter::start("register", config.register, clock, sweep_interval)?,
        })
    }

    /// Build both limiters without background sweeps.
    pub fn unswept(config: &RateLimitingConfig, clock: Arc<dyn Clock>) -> Result<Self, PolicyError> {
        Ok(Self {
            login: Arc::new(RateLimiter::with_clock(config.login, Arc::clone(&clock))?.named("login")),
            register: Arc::new(RateLimiter::with_clock(config.register, clock)?.named("register")),
        })
    }

    /// Shut both limiters down.
    pub async fn shutdown(&self) {
        futures::join!(self.login.shutdown(), self.register.shutdown());
    }
}
