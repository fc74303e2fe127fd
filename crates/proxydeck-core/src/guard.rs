// ── Single-flight guards ──
//
// All guards are checked-and-set synchronously, before the caller's first
// suspension point, and released by `Drop` on every exit path including
// cancellation of the owning future.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::model::{ConnectionAttempt, Provider};

// ── SingleFlight ─────────────────────────────────────────────────────

/// At most one holder at a time; a second `try_acquire` fails instead of
/// waiting.
#[derive(Debug, Default)]
pub(crate) struct SingleFlight {
    busy: AtomicBool,
}

impl SingleFlight {
    pub(crate) fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { flag: &self.busy })
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

pub(crate) struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ── KeyedFlight ──────────────────────────────────────────────────────

/// Single-flight per key. The in-flight key set is published as a
/// snapshot so consumers can show per-row progress.
pub(crate) struct KeyedFlight<K: Ord + Clone + Send + Sync + 'static> {
    keys: watch::Sender<BTreeSet<K>>,
}

impl<K: Ord + Clone + Send + Sync + 'static> KeyedFlight<K> {
    pub(crate) fn new() -> Self {
        let (keys, _) = watch::channel(BTreeSet::new());
        Self { keys }
    }

    pub(crate) fn try_acquire(&self, key: K) -> Option<KeyedGuard<'_, K>> {
        let acquired = self.keys.send_if_modified(|keys| keys.insert(key.clone()));
        acquired.then_some(KeyedGuard {
            keys: &self.keys,
            key,
        })
    }

    pub(crate) fn in_flight(&self) -> BTreeSet<K> {
        self.keys.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<BTreeSet<K>> {
        self.keys.subscribe()
    }
}

pub(crate) struct KeyedGuard<'a, K: Ord + Clone + Send + Sync + 'static> {
    keys: &'a watch::Sender<BTreeSet<K>>,
    key: K,
}

impl<K: Ord + Clone + Send + Sync + 'static> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        self.keys.send_if_modified(|keys| keys.remove(&self.key));
    }
}

// ── AttemptSlot ──────────────────────────────────────────────────────

/// Holds the single system-wide connection attempt. The slot doubles as
/// the published snapshot: consumers see `Some` exactly while a guard is
/// alive.
pub(crate) struct AttemptSlot {
    slot: watch::Sender<Option<ConnectionAttempt>>,
}

impl AttemptSlot {
    pub(crate) fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot }
    }

    /// Claim the slot for `provider`, or return the provider currently
    /// holding it.
    pub(crate) fn try_begin(&self, provider: Provider) -> Result<AttemptGuard<'_>, Provider> {
        let mut holder = None;
        let acquired = self.slot.send_if_modified(|slot| {
            if let Some(current) = slot {
                holder = Some(current.provider);
                return false;
            }
            *slot = Some(ConnectionAttempt::begin(provider));
            true
        });
        if acquired {
            Ok(AttemptGuard { slot: &self.slot })
        } else {
            Err(holder.unwrap_or(provider))
        }
    }

    pub(crate) fn current(&self) -> Option<ConnectionAttempt> {
        self.slot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<ConnectionAttempt>> {
        self.slot.subscribe()
    }
}

pub(crate) struct AttemptGuard<'a> {
    slot: &'a watch::Sender<Option<ConnectionAttempt>>,
}

impl AttemptGuard<'_> {
    /// Apply a progress update and publish it.
    pub(crate) fn update(&self, f: impl FnOnce(&mut ConnectionAttempt)) {
        self.slot.send_modify(|slot| {
            if let Some(attempt) = slot.as_mut() {
                f(attempt);
            }
        });
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.slot.send_replace(None);
    }
}
