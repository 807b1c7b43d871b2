//! Lock-free byte tally shared between a stream and its observers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe accumulator of bytes moved through one stream
#[derive(Debug, Default)]
pub struct ByteCounter {
    total: AtomicU64,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signed delta. Negative values are dropped.
    pub fn add(&self, n: i64) {
        if let Ok(n) = u64::try_from(n) {
            self.total.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Add a byte count reported by a read or write
    pub fn add_bytes(&self, n: usize) {
        self.total.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Current total
    pub fn count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
