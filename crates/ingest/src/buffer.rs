//! Bounded accumulation buffer between fetching and flushing.
//!
//! Pages are appended whole, so the buffer may transiently exceed its
//! capacity; the driver drains capacity-sized chunks whenever the threshold
//! is reached, which keeps flush batches at exactly `capacity` records until
//! the final remainder.

use orderhub_core::Platform;

/// A per-pipeline buffer of decoded records awaiting flush.
#[derive(Debug)]
pub struct Buffer<T> {
    platform: Platform,
    capacity: usize,
    records: Vec<T>,
}

impl<T> Buffer<T> {
    /// Create an empty buffer. A capacity of zero is clamped to one so the
    /// drain loop always makes progress.
    #[must_use]
    pub fn new(platform: Platform, capacity: usize) -> Self {
        Self {
            platform,
            capacity: capacity.max(1),
            records: Vec::new(),
        }
    }

    /// Append a whole page of records, even if that pushes the buffer past
    /// its capacity.
    pub fn append(&mut self, page: Vec<T>) {
        self.records.extend(page);
    }

    /// Whether the buffer holds at least `capacity` records and a flush is
    /// due.
    #[must_use]
    pub fn is_at_threshold(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Remove and return up to `capacity` records from the front, preserving
    /// arrival order.
    pub fn drain_chunk(&mut self) -> Vec<T> {
        let n = self.capacity.min(self.records.len());
        self.records.drain(..n).collect()
    }

    /// Remove and return everything left in the buffer.
    pub fn drain_all(&mut self) -> Vec<T> {
        std::mem::take(&mut self.records)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }
}
