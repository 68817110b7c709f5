//! Single-slot mailbox where the newest item wins.
//!
//! The producer never blocks: a new item replaces one that has not been
//! taken yet, and the replaced item is counted as dropped. The consumer
//! blocks with a timeout so it can notice shutdown.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct Slot<T> {
    item: Option<T>,
    dropped: u64,
}

/// Newest-wins handoff between one producer and one consumer.
pub struct LatestSlot<T> {
    slot: Mutex<Slot<T>>,
    filled: Condvar,
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                item: None,
                dropped: 0,
            }),
            filled: Condvar::new(),
        }
    }

    /// Store `item`, replacing any unprocessed one. Returns true if an item was dropped.
    pub fn put(&self, item: T) -> bool {
        let mut slot = self.slot.lock();
        let replaced = slot.item.replace(item).is_some();
        if replaced {
            slot.dropped += 1;
        }
        drop(slot);
        self.filled.notify_one();
        replaced
    }

    /// Take the pending item without waiting.
    pub fn try_take(&self) -> Option<T> {
        self.slot.lock().item.take()
    }

    /// Take the pending item, waiting up to `timeout` for one to arrive.
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut slot = self.slot.lock();
        while slot.item.is_none() {
            match deadline {
                Some(deadline) => {
                    if self.filled.wait_until(&mut slot, deadline).timed_out() {
                        break;
                    }
                }
                None => self.filled.wait(&mut slot),
            }
        }
        slot.item.take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().item.is_none()
    }

    /// Items replaced before they were taken.
    pub fn dropped(&self) -> u64 {
        self.slot.lock().dropped
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
