//! Identifier allocation shared by documents and chunks.
//!
//! Documents and chunks draw from one counter so their IDs never collide when
//! the two maps are persisted side by side. The allocator is not synchronized
//! on its own; it lives inside the index state and is only reached through the
//! store's write lock.

use codeseek_core::CodeseekError;

/// Issues strictly increasing IDs, starting at 1.
///
/// # Examples
///
/// ```
/// use codeseek_index::ids::IdAllocator;
///
/// let mut ids = IdAllocator::new();
/// assert_eq!(ids.next_id().unwrap(), 1);
/// assert_eq!(ids.next_id().unwrap(), 2);
///
/// let resumed = IdAllocator::resume_after(Some(41));
/// assert_eq!(resumed.peek(), 42);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    /// A fresh allocator whose first ID is 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// An allocator that continues after the largest ID already in use.
    ///
    /// `None` (an empty index) starts over at 1. After `Some(u64::MAX)` the
    /// allocator is exhausted and [`next_id`](Self::next_id) fails.
    pub fn resume_after(max_existing: Option<u64>) -> Self {
        Self {
            next: max_existing.map_or(1, |max| max.saturating_add(1)),
        }
    }

    /// Hand out the next ID.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::Internal`] once the ID space is used up. The
    /// allocator never wraps around to an ID that may already be taken.
    pub fn next_id(&mut self) -> Result<u64, CodeseekError> {
        let id = self.next;
        self.next = id
            .checked_add(1)
            .ok_or_else(|| CodeseekError::Internal("document/chunk ID space exhausted".into()))?;
        Ok(id)
    }

    /// The ID the next call to [`next_id`](Self::next_id) will return.
    pub fn peek(&self) -> u64 {
        self.next
    }
}
