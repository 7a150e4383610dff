//! Injected scheduler abstraction
//!
//! The core never reads wall-clock time. Repeating timers are registered with a
//! [`Scheduler`] and fired by popping due entries one at a time, so a dispatch
//! that cancels another timer takes effect before that timer can fire.
//! Drivers feed real elapsed time into a [`VirtualClock`]; tests advance it
//! deterministically.

use serde::{Deserialize, Serialize};

/// Opaque handle to a scheduled repeating timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerHandle(u64);

/// What a timer drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerKind {
    /// Periodic piece gravity
    Gravity,
    /// Per-second challenge countdown
    Countdown,
}

/// A single timer firing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFire {
    pub handle: TimerHandle,
    pub kind: TimerKind,
    /// Virtual time of the firing (ms)
    pub at_ms: u64,
}

/// Repeating-timer scheduler
pub trait Scheduler {
    /// Current virtual time (ms)
    fn now_ms(&self) -> u64;

    /// Register a timer firing every `interval_ms`, first at `now + interval_ms`
    fn schedule_repeating(&mut self, kind: TimerKind, interval_ms: u64) -> TimerHandle;

    /// Cancel a timer. Cancelling an unknown or already-cancelled handle is a no-op.
    fn cancel(&mut self, handle: TimerHandle);

    /// Whether the handle refers to a live timer
    fn is_scheduled(&self, handle: TimerHandle) -> bool;

    /// Pop the earliest firing due at or before `until_ms`.
    ///
    /// Time advances to the firing and the timer is re-armed for its next
    /// interval. When nothing is due, time advances to `until_ms` and `None`
    /// is returned.
    fn pop_due(&mut self, until_ms: u64) -> Option<TimerFire>;
}

#[derive(Debug, Clone)]
struct Entry {
    handle: TimerHandle,
    kind: TimerKind,
    interval_ms: u64,
    next_fire_ms: u64,
}

/// Deterministic scheduler driven by explicit time advancement
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now_ms: u64,
    next_handle: u64,
    timers: Vec<Entry>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live timers
    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    /// Interval of a live timer
    pub fn interval_of(&self, handle: TimerHandle) -> Option<u64> {
        self.timers
            .iter()
            .find(|e| e.handle == handle)
            .map(|e| e.interval_ms)
    }
}

impl Scheduler for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn schedule_repeating(&mut self, kind: TimerKind, interval_ms: u64) -> TimerHandle {
        // A zero interval would fire forever without advancing time
        let interval_ms = interval_ms.max(1);
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        self.timers.push(Entry {
            handle,
            kind,
            interval_ms,
            next_fire_ms: self.now_ms + interval_ms,
        });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.timers.retain(|e| e.handle != handle);
    }

    fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.timers.iter().any(|e| e.handle == handle)
    }

    fn pop_due(&mut self, until_ms: u64) -> Option<TimerFire> {
        // Earliest first; ties go to the older timer for a stable order
        let due = self
            .timers
            .iter_mut()
            .filter(|e| e.next_fire_ms <= until_ms)
            .min_by_key(|e| (e.next_fire_ms, e.handle.0));

        match due {
            Some(entry) => {
                let at_ms = entry.next_fire_ms;
                entry.next_fire_ms += entry.interval_ms;
                self.now_ms = self.now_ms.max(at_ms);
                Some(TimerFire {
                    handle: entry.handle,
                    kind: entry.kind,
                    at_ms,
                })
            }
            None => {
                self.now_ms = self.now_ms.max(until_ms);
                None
            }
        }
    }
}
