//! Per-operation-category timeouts.
//!
//! [`Timeouts`] is the plain configuration value. [`SharedTimeouts`] is the
//! handle a handler owns and hands to every listing and stream it creates:
//! the timeout for a backend call is read from it immediately before the
//! call is issued, so mutating a field affects calls issued afterwards but
//! never a call already in flight.
//!
//! Fields are independent atomic cells without any snapshot. Concurrent
//! writers race with last-write-wins semantics; callers that need isolation
//! use [`SharedTimeouts::detached`] to get their own copy.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Category of backend call, each with its own timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Paginated listings of paths and filesystems
    List,
    /// Property lookups
    Metadata,
    /// Ranged reads
    Read,
    /// Appends and commits
    Write,
    /// Create, delete and rename of paths and filesystems
    Mutate,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::List,
        OperationKind::Metadata,
        OperationKind::Read,
        OperationKind::Write,
        OperationKind::Mutate,
    ];

    fn index(self) -> usize {
        match self {
            OperationKind::List => 0,
            OperationKind::Metadata => 1,
            OperationKind::Read => 2,
            OperationKind::Write => 3,
            OperationKind::Mutate => 4,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            OperationKind::List => "list",
            OperationKind::Metadata => "metadata",
            OperationKind::Read => "read",
            OperationKind::Write => "write",
            OperationKind::Mutate => "mutate",
        }
    }
}

/// Timeouts in seconds; `None` leaves the backend default in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub list: Option<f64>,
    pub metadata: Option<f64>,
    pub read: Option<f64>,
    pub write: Option<f64>,
    pub mutate: Option<f64>,
}

impl Timeouts {
    #[must_use]
    pub fn get(&self, kind: OperationKind) -> Option<f64> {
        match kind {
            OperationKind::List => self.list,
            OperationKind::Metadata => self.metadata,
            OperationKind::Read => self.read,
            OperationKind::Write => self.write,
            OperationKind::Mutate => self.mutate,
        }
    }

    pub fn set(&mut self, kind: OperationKind, seconds: Option<f64>) {
        let seconds = seconds.filter(|s| s.is_finite() && *s >= 0.0);
        match kind {
            OperationKind::List => self.list = seconds,
            OperationKind::Metadata => self.metadata = seconds,
            OperationKind::Read => self.read = seconds,
            OperationKind::Write => self.write = seconds,
            OperationKind::Mutate => self.mutate = seconds,
        }
    }

    /// Same value for every category
    #[must_use]
    pub fn uniform(seconds: f64) -> Self {
        let mut timeouts = Timeouts::default();
        for kind in OperationKind::ALL {
            timeouts.set(kind, Some(seconds));
        }
        timeouts
    }
}

// f64 bit patterns never collide with this NaN payload because only
// finite values are stored.
const UNSET: u64 = u64::MAX;

/// Shared, mutable-in-place timeout set. `Clone` shares the same cells.
#[derive(Debug, Clone)]
pub struct SharedTimeouts(Arc<[AtomicU64; 5]>);

impl Default for SharedTimeouts {
    fn default() -> Self {
        Self::new(Timeouts::default())
    }
}

impl From<Timeouts> for SharedTimeouts {
    fn from(timeouts: Timeouts) -> Self {
        Self::new(timeouts)
    }
}

impl SharedTimeouts {
    #[must_use]
    pub fn new(timeouts: Timeouts) -> Self {
        let shared = Self(Arc::new(std::array::from_fn(|_| AtomicU64::new(UNSET))));
        shared.replace(timeouts);
        shared
    }

    /// Seconds configured for `kind`
    #[must_use]
    pub fn seconds(&self, kind: OperationKind) -> Option<f64> {
        match self.0[kind.index()].load(Ordering::Relaxed) {
            UNSET => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

    /// Timeout to apply to a call of `kind` issued now. A value too large
    /// for a `Duration` saturates rather than falling back to the default.
    #[must_use]
    pub fn get(&self, kind: OperationKind) -> Option<Duration> {
        self.seconds(kind)
            .map(|s| Duration::try_from_secs_f64(s).unwrap_or(Duration::MAX))
    }

    /// Sets or clears one category. Negative and non-finite values clear it.
    pub fn set(&self, kind: OperationKind, seconds: Option<f64>) {
        let bits = seconds
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map_or(UNSET, f64::to_bits);
        self.0[kind.index()].store(bits, Ordering::Relaxed);
    }

    pub fn replace(&self, timeouts: Timeouts) {
        for kind in OperationKind::ALL {
            self.set(kind, timeouts.get(kind));
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Timeouts {
        let mut timeouts = Timeouts::default();
        for kind in OperationKind::ALL {
            timeouts.set(kind, self.seconds(kind));
        }
        timeouts
    }

    /// Independent copy; mutations on either side are not seen by the other.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self::new(self.snapshot())
    }

    /// True when both handles share the same cells
    #[must_use]
    pub fn shares_with(&self, other: &SharedTimeouts) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
