use std::collections::VecDeque;

use tandem_core::UserInfoRecord;

/// FIFO buffer of inbound user-info not yet consumed by a drain.
///
/// `drain_all` is the only way to read; there is no peek. Mutation goes
/// through `&mut self`, so a drain and an arrival can never interleave: an
/// item is either in the drained batch or left in the queue, never both.
#[derive(Debug, Default)]
pub struct MissedItemQueue {
    items: VecDeque<UserInfoRecord>,
    capacity: Option<usize>,
    dropped: u64,
}

impl MissedItemQueue {
    /// Creates a queue that drops its oldest item past `capacity`.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Appends to the tail. Returns the item dropped to stay within capacity.
    pub fn enqueue(&mut self, item: UserInfoRecord) -> Option<UserInfoRecord> {
        self.items.push_back(item);
        match self.capacity {
            Some(cap) if self.items.len() > cap => {
                self.dropped += 1;
                self.items.pop_front()
            }
            _ => None,
        }
    }

    /// Returns every queued item in arrival order and empties the queue.
    pub fn drain_all(&mut self) -> Vec<UserInfoRecord> {
        self.items.drain(..).collect()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when no items are queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items dropped by the capacity bound since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
