//! Login attempt governor.
//!
//! Tracks consecutive failed logins per client address and locks an address
//! out once it reaches the failure threshold inside the lockout window. The
//! attempt table lives behind the [`AttemptStore`] trait so it can be moved
//! to a shared store when several instances serve the same users.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Failed logins before an address is locked out.
pub const DEFAULT_MAX_LOGIN_FAILURES: u32 = 5;

/// Lockout window (15 minutes).
pub const DEFAULT_LOCKOUT_WINDOW_SECS: u64 = 15 * 60;

/// Attempt store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptStoreError {
    /// A lock guarding attempt state was poisoned.
    #[error("attempt state lock poisoned")]
    Poisoned,

    /// Backend failure.
    #[error("attempt store unavailable: {0}")]
    Unavailable(String),
}

/// Failed-login record for one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Consecutive failures in the current window.
    pub failures: u32,
    /// Time of the most recent failure.
    pub last_attempt: DateTime<Utc>,
}

impl AttemptRecord {
    /// Time since the last attempt; zero if the clock went backwards.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_attempt).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the window has fully elapsed since the last attempt.
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.elapsed(now) >= window
    }
}

/// Storage capability for login attempt records.
///
/// `increment` must be atomic per address: concurrent calls for the same
/// address may not lose updates.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Current record for an address.
    async fn get(&self, addr: IpAddr) -> Result<Option<AttemptRecord>, AttemptStoreError>;

    /// Record one failure at `now`, starting from zero if the existing
    /// record is older than `window`.
    async fn increment(
        &self,
        addr: IpAddr,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<AttemptRecord, AttemptStoreError>;

    /// Forget an address.
    async fn reset(&self, addr: IpAddr) -> Result<(), AttemptStoreError>;

    /// Drop records whose last attempt is at or before `cutoff`.
    ///
    /// Returns the number of addresses evicted.
    async fn sweep(&self, cutoff: DateTime<Utc>) -> Result<usize, AttemptStoreError>;
}

type Slot = Arc<Mutex<Option<AttemptRecord>>>;

/// In-process attempt store.
///
/// Each address gets its own mutex. The outer map lock is only held to find
/// or insert a slot, so attempts from different addresses never wait on each
/// other's read-modify-write.
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    slots: RwLock<HashMap<IpAddr, Slot>>,
}

impl MemoryAttemptStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of addresses currently holding a slot.
    pub fn len(&self) -> usize {
        self.slots.read().map(|slots| slots.len()).unwrap_or(0)
    }

    /// Whether no address holds a slot.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn existing_slot(&self, addr: &IpAddr) -> Result<Option<Slot>, AttemptStoreError> {
        let slots = self.slots.read().map_err(|_| AttemptStoreError::Poisoned)?;
        Ok(slots.get(addr).cloned())
    }

    fn slot_for(&self, addr: IpAddr) -> Result<Slot, AttemptStoreError> {
        if let Some(slot) = self.existing_slot(&addr)? {
            return Ok(slot);
        }

        let mut slots = self.slots.write().map_err(|_| AttemptStoreError::Poisoned)?;
        // Another request may have inserted it while we waited
        Ok(slots.entry(addr).or_default().clone())
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn get(&self, addr: IpAddr) -> Result<Option<AttemptRecord>, AttemptStoreError> {
        match self.existing_slot(&addr)? {
            Some(slot) => {
                let record = slot.lock().map_err(|_| AttemptStoreError::Poisoned)?;
                Ok(*record)
            }
            None => Ok(None),
        }
    }

    async fn increment(
        &self,
        addr: IpAddr,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<AttemptRecord, AttemptStoreError> {
        let slot = self.slot_for(addr)?;
        let mut record = slot.lock().map_err(|_| AttemptStoreError::Poisoned)?;

        let failures = match *record {
            Some(existing) if !existing.is_stale(now, window) => existing.failures.saturating_add(1),
            _ => 1,
        };
        let updated = AttemptRecord {
            failures,
            last_attempt: now,
        };
        *record = Some(updated);

        Ok(updated)
    }

    async fn reset(&self, addr: IpAddr) -> Result<(), AttemptStoreError> {
        // The slot itself stays until the next sweep; removing it here could
        // orphan a slot another request is about to increment.
        if let Some(slot) = self.existing_slot(&addr)? {
            let mut record = slot.lock().map_err(|_| AttemptStoreError::Poisoned)?;
            *record = None;
        }
        Ok(())
    }

    async fn sweep(&self, cutoff: DateTime<Utc>) -> Result<usize, AttemptStoreError> {
        let mut slots = self.slots.write().map_err(|_| AttemptStoreError::Poisoned)?;
        let before = slots.len();

        // Slots handed out to in-flight requests (strong count > 1) are kept
        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.lock() {
                Ok(record) => matches!(*record, Some(r) if r.last_attempt > cutoff),
                Err(_) => true,
            }
        });

        Ok(before - slots.len())
    }
}

/// Lockout policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernorPolicy {
    /// Failures that trigger a lockout.
    pub max_failures: u32,
    /// How long failures are remembered after the last one.
    pub lockout_window: Duration,
}

impl Default for GovernorPolicy {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_MAX_LOGIN_FAILURES,
            lockout_window: Duration::from_secs(DEFAULT_LOCKOUT_WINDOW_SECS),
        }
    }
}

/// Outcome of a pre-login check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginDecision {
    /// The attempt may proceed.
    Allow,
    /// The address is locked out.
    Reject {
        /// Time until the lockout lifts.
        retry_after: Duration,
    },
}

impl LoginDecision {
    /// Check if the attempt may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, LoginDecision::Allow)
    }
}

/// Enforces the lockout policy on top of an attempt store.
#[derive(Clone)]
pub struct LoginGovernor {
    store: Arc<dyn AttemptStore>,
    policy: GovernorPolicy,
}

impl std::fmt::Debug for LoginGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginGovernor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl LoginGovernor {
    /// Create a governor over the given store.
    pub fn new(store: Arc<dyn AttemptStore>, policy: GovernorPolicy) -> Self {
        Self { store, policy }
    }

    /// Create a governor with an in-process store.
    pub fn in_memory(policy: GovernorPolicy) -> Self {
        Self::new(Arc::new(MemoryAttemptStore::new()), policy)
    }

    /// The lockout policy.
    pub fn policy(&self) -> GovernorPolicy {
        self.policy
    }

    /// Check whether a login attempt from `addr` may proceed.
    pub async fn check_allowed(&self, addr: IpAddr) -> LoginDecision {
        self.check_allowed_at(addr, Utc::now()).await
    }

    /// [`check_allowed`](Self::check_allowed) at an explicit instant.
    pub async fn check_allowed_at(&self, addr: IpAddr, now: DateTime<Utc>) -> LoginDecision {
        let window = self.policy.lockout_window;

        let record = match self.store.get(addr).await {
            Ok(record) => record,
            Err(e) => {
                error!(ip = %addr, error = %e, "Attempt store failed; rejecting login");
                return LoginDecision::Reject {
                    retry_after: window,
                };
            }
        };

        let Some(record) = record else {
            return LoginDecision::Allow;
        };

        // Stale records are left in place: increment restarts them and the
        // sweeper evicts them, so a check never clears a concurrent failure.
        if record.is_stale(now, window) {
            return LoginDecision::Allow;
        }

        if record.failures >= self.policy.max_failures {
            let retry_after = window - record.elapsed(now);
            warn!(
                ip = %addr,
                failures = record.failures,
                retry_after_secs = retry_after.as_secs(),
                "Login attempt blocked: address locked out"
            );
            return LoginDecision::Reject { retry_after };
        }

        LoginDecision::Allow
    }

    /// Record the outcome of a login attempt from `addr`.
    ///
    /// Success clears the address; failure counts towards the lockout.
    pub async fn record_attempt(
        &self,
        addr: IpAddr,
        succeeded: bool,
    ) -> Result<Option<AttemptRecord>, AttemptStoreError> {
        self.record_attempt_at(addr, succeeded, Utc::now()).await
    }

    /// [`record_attempt`](Self::record_attempt) at an explicit instant.
    pub async fn record_attempt_at(
        &self,
        addr: IpAddr,
        succeeded: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<AttemptRecord>, AttemptStoreError> {
        if succeeded {
            self.store.reset(addr).await?;
            return Ok(None);
        }

        let record = self
            .store
            .increment(addr, now, self.policy.lockout_window)
            .await?;

        debug!(
            ip = %addr,
            failures = record.failures,
            "Recorded failed login attempt"
        );

        if record.failures == self.policy.max_failures {
            info!(ip = %addr, "Address reached login failure limit");
        }

        Ok(Some(record))
    }

    /// Failures currently counted against `addr`.
    pub async fn failure_count(&self, addr: IpAddr) -> Result<u32, AttemptStoreError> {
        let now = Utc::now();
        Ok(match self.store.get(addr).await? {
            Some(record) if !record.is_stale(now, self.policy.lockout_window) => record.failures,
            _ => 0,
        })
    }

    /// Evict records whose window has elapsed.
    pub async fn sweep(&self) -> Result<usize, AttemptStoreError> {
        self.sweep_at(Utc::now()).await
    }

    /// [`sweep`](Self::sweep) at an explicit instant.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize, AttemptStoreError> {
        let window = chrono::Duration::from_std(self.policy.lockout_window)
            .map_err(|e| AttemptStoreError::Unavailable(e.to_string()))?;
        self.store.sweep(now - window).await
    }

    /// Start a background task that sweeps stale records every `interval`.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Skip the first immediate tick
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match self.sweep().await {
                    Ok(0) => debug!("No stale login attempt records to sweep"),
                    Ok(count) => info!(evicted = count, "Swept stale login attempt records"),
                    Err(e) => warn!(error = %e, "Failed to sweep login attempt records"),
                }
            }
        })
    }
}
