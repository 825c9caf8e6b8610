//! Fixed-window admission control for report generation.
//!
//! Every client identity gets its own window: at most `max_requests`
//! admissions are granted until `reset_at`, after which the window is
//! replaced by a fresh one. Windows live only in memory, so a restart
//! forgets every counter.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::models::serialize_timestamp;

pub const DEFAULT_MAX_REQUESTS: u32 = 3;
pub const DEFAULT_WINDOW_SECS: i64 = 24 * 60 * 60;

// Expired windows are swept at most this often
const SWEEP_INTERVAL_SECS: i64 = 60;

/// Source of the current time. Injected so tests can move time by hand.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Admission state for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionWindow {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

impl AdmissionWindow {
    pub fn open(now: DateTime<Utc>, duration: TimeDelta) -> Self {
        Self {
            count: 0,
            reset_at: now
                .checked_add_signed(duration)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.reset_at
    }
}

/// Storage for admission windows, keyed by identity.
///
/// `update` must run `apply` while holding the identity exclusively: the
/// controller relies on it to make check-then-increment atomic.
pub trait WindowStore: Send + Sync {
    fn update<R>(
        &self,
        identity: &str,
        open: impl FnOnce() -> AdmissionWindow,
        apply: impl FnOnce(&mut AdmissionWindow) -> R,
    ) -> R;

    fn get(&self, identity: &str) -> Option<AdmissionWindow>;

    /// Drops every window that has expired at `now`, returning how many went.
    fn sweep_expired(&self, now: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// DashMap shards its locks, so different identities rarely contend while the
// entry guard serializes updates to the same identity.
#[derive(Debug, Default)]
pub struct InMemoryWindowStore {
    windows: DashMap<String, AdmissionWindow>,
}

impl WindowStore for InMemoryWindowStore {
    fn update<R>(
        &self,
        identity: &str,
        open: impl FnOnce() -> AdmissionWindow,
        apply: impl FnOnce(&mut AdmissionWindow) -> R,
    ) -> R {
        let mut entry = self
            .windows
            .entry(identity.to_string())
            .or_insert_with(open);
        apply(entry.value_mut())
    }

    fn get(&self, identity: &str) -> Option<AdmissionWindow> {
        self.windows.get(identity).map(|window| *window)
    }

    fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_expired(now));
        before.saturating_sub(self.windows.len())
    }

    fn len(&self) -> usize {
        self.windows.len()
    }
}

/// Quota snapshot reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub remaining: u32,
    pub used: u32,
    pub limit: u32,
    #[serde(serialize_with = "serialize_timestamp")]
    pub reset_time: DateTime<Utc>,
}

impl QuotaStatus {
    fn from_window(window: &AdmissionWindow, limit: u32) -> Self {
        Self {
            remaining: limit.saturating_sub(window.count),
            used: window.count,
            limit,
            reset_time: window.reset_at,
        }
    }
}

/// Outcome of an admission check. Both arms carry the quota after the check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admitted(QuotaStatus),
    Denied(QuotaStatus),
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted(_))
    }

    pub fn status(&self) -> &QuotaStatus {
        match self {
            Decision::Admitted(status) | Decision::Denied(status) => status,
        }
    }
}

/// Bounds admissions per identity within a fixed window.
pub struct AdmissionController<S = InMemoryWindowStore, C = SystemClock> {
    store: S,
    clock: C,
    max_requests: u32,
    window: TimeDelta,
    last_sweep_ms: AtomicI64,
}

impl AdmissionController {
    pub fn new(max_requests: u32, window: TimeDelta) -> Self {
        Self::with_parts(InMemoryWindowStore::default(), SystemClock, max_requests, window)
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, TimeDelta::seconds(DEFAULT_WINDOW_SECS))
    }
}

impl<S: WindowStore, C: Clock> AdmissionController<S, C> {
    pub fn with_parts(store: S, clock: C, max_requests: u32, window: TimeDelta) -> Self {
        Self {
            store,
            clock,
            max_requests,
            window,
            last_sweep_ms: AtomicI64::new(i64::MIN),
        }
    }

    /// Number of identities that currently hold a window.
    pub fn tracked_identities(&self) -> usize {
        self.store.len()
    }

    /// Admits the request if the identity has quota left in its window.
    ///
    /// An expired window is replaced before the check. A denial leaves the
    /// window untouched, so repeated denials report the same `used` count.
    pub fn check_and_admit(&self, identity: &str) -> Decision {
        let now = self.clock.now();
        self.maybe_sweep(now);

        let max_requests = self.max_requests;
        let duration = self.window;
        let decision = self.store.update(
            identity,
            || AdmissionWindow::open(now, duration),
            |window| {
                if window.is_expired(now) {
                    *window = AdmissionWindow::open(now, duration);
                }
                if window.count >= max_requests {
                    return Decision::Denied(QuotaStatus {
                        remaining: 0,
                        ..QuotaStatus::from_window(window, max_requests)
                    });
                }
                window.count += 1;
                Decision::Admitted(QuotaStatus::from_window(window, max_requests))
            },
        );

        match &decision {
            Decision::Admitted(status) => debug!(
                identity,
                used = status.used,
                limit = status.limit,
                "admitted report generation"
            ),
            Decision::Denied(status) => warn!(
                identity,
                used = status.used,
                reset = %status.reset_time,
                "report generation quota exceeded"
            ),
        }
        decision
    }

    /// Reports the identity's quota without consuming any of it.
    ///
    /// Never-seen and expired identities report a full quota with a window
    /// starting now; nothing is written to the store.
    pub fn peek_status(&self, identity: &str) -> QuotaStatus {
        let now = self.clock.now();
        let window = match self.store.get(identity) {
            Some(window) if !window.is_expired(now) => window,
            _ => AdmissionWindow::open(now, self.window),
        };
        QuotaStatus::from_window(&window, self.max_requests)
    }

    fn maybe_sweep(&self, now: DateTime<Utc>) {
        let now_ms = now.timestamp_millis();
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        let interval_ms = SWEEP_INTERVAL_SECS * 1000;
        if last != i64::MIN && now_ms.saturating_sub(last) < interval_ms {
            return;
        }
        // only one caller sweeps per interval
        if self
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let swept = self.store.sweep_expired(now);
        if swept > 0 {
            debug!(swept, "swept expired admission windows");
        }
    }
}
