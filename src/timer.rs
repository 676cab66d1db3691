//! Timer wheel (C4): monotonic scheduled callbacks identified by 16-bit
//! ids. The host drives expiry by calling [`TimerWheel::tick`] from its
//! own poll loop; this module never spawns threads or sleeps.

use std::time::{Duration, Instant};

/// Never issued as a live timer id (spec.md §3 invariant).
pub const NO_TIMER: u16 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u16);

struct Entry {
    id: TimerId,
    deadline: Instant,
    deleted: bool,
}

/// Scheduled-callback registry. `tick` returns the ids that fired so the
/// caller can invoke whatever is associated with them; the wheel itself
/// holds no callback pointers, matching the C9/C8 modules which own their
/// own "what does this timer mean" association.
pub struct TimerWheel {
    entries: Vec<Entry>,
    next_id: u16,
}

impl Default for TimerWheel {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerWheel {
    pub fn new() -> Self {
        TimerWheel {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> TimerId {
        loop {
            let candidate = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if self.next_id == NO_TIMER {
                self.next_id = 1;
            }
            if candidate != NO_TIMER && !self.entries.iter().any(|e| !e.deleted && e.id.0 == candidate) {
                return TimerId(candidate);
            }
        }
    }

    /// Arm a timer to fire `timeout` from `now`.
    pub fn set(&mut self, now: Instant, timeout: Duration) -> TimerId {
        let id = self.allocate_id();
        self.entries.push(Entry {
            id,
            deadline: now + timeout,
            deleted: false,
        });
        id
    }

    /// Remove a timer. Safe to call even if the timer is currently firing
    /// (mark-deleted semantics) or already gone.
    pub fn remove(&mut self, id: TimerId) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.deleted = true;
        }
    }

    /// Earliest deadline among live timers, for the host to compute its
    /// poll timeout.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter(|e| !e.deleted)
            .map(|e| e.deadline)
            .min()
    }

    /// Pop every timer whose deadline has passed as of `now`, in deadline
    /// order, removing them from the wheel.
    pub fn tick(&mut self, now: Instant) -> Vec<TimerId> {
        let mut fired = Vec::new();
        self.entries.retain(|e| {
            if !e.deleted && e.deadline <= now {
                fired.push((e.deadline, e.id));
                false
            } else {
                !e.deleted
            }
        });
        fired.sort_by_key(|&(deadline, _)| deadline);
        fired.into_iter().map(|(_, id)| id).collect()
    }
}
