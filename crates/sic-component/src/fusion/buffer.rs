//! Bounded newest-first buffer for one input stream.

use sic_message::Message;
use std::collections::VecDeque;

/// Drop counts at which an overflow warning is emitted.
pub const DROP_WARNING_THRESHOLDS: [u64; 8] = [5, 10, 50, 100, 200, 1000, 5000, 10000];

/// Whether reaching `dropped` evictions should be reported.
#[must_use]
pub fn is_drop_warning(dropped: u64) -> bool {
    DROP_WARNING_THRESHOLDS.contains(&dropped)
}

/// Messages of one (type, origin) stream, newest first.
///
/// On overflow the oldest message is evicted and counted.
#[derive(Debug)]
pub struct InputBuffer {
    items: VecDeque<Box<dyn Message>>,
    capacity: usize,
    dropped: u64,
}

impl InputBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Insert as the newest entry.
    ///
    /// Returns the running drop count when an older message was evicted.
    pub fn push(&mut self, message: Box<dyn Message>) -> Option<u64> {
        self.items.push_front(message);
        if self.items.len() > self.capacity {
            self.items.pop_back();
            self.dropped += 1;
            return Some(self.dropped);
        }
        None
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    #[must_use]
    pub fn newest_timestamp(&self) -> Option<f64> {
        self.items.front().and_then(|m| m.timestamp())
    }

    /// Index of the newest message within `tolerance` seconds of `target`.
    #[must_use]
    pub fn position_within(&self, target: f64, tolerance: f64) -> Option<usize> {
        self.items.iter().position(|m| {
            m.timestamp()
                .is_some_and(|ts| (ts - target).abs() <= tolerance)
        })
    }

    pub fn take(&mut self, index: usize) -> Option<Box<dyn Message>> {
        self.items.remove(index)
    }

    /// Timestamps, newest first.
    #[must_use]
    pub fn timestamps(&self) -> Vec<f64> {
        self.items.iter().filter_map(|m| m.timestamp()).collect()
    }
}
