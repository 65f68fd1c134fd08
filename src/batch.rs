//! Splitting fetch results into bounded, ordered batches.
//!
//! For `n` items and a fixed cap `c`, the effective batch size is
//! `min(c, n)` and `ceil(n / size)` batches are produced. Batch `i`
//! (1-based) holds items `(i-1)*size .. min(i*size, n)`. An empty result
//! produces no batches at all.

use crate::capability::Profile;

/// One chunk of a fetch result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Position of this batch, starting at 1.
    pub batch_index: usize,
    /// Total number of batches for the fetch.
    pub batch_count: usize,
    pub items: Vec<Profile>,
}

/// Lazily yields the batches for one fetch result.
///
/// Created by [`emit_batches`].
#[derive(Debug)]
pub struct Batches {
    remaining: std::vec::IntoIter<Profile>,
    size: usize,
    next_index: usize,
    count: usize,
}

/// Partition `items` into batches of at most `max_batch_size` profiles.
///
/// The cap is clamped to the result size, so a small result is sent as a
/// single batch.
pub fn emit_batches(items: Vec<Profile>, max_batch_size: usize) -> Batches {
    let size = max_batch_size.min(items.len()).max(1);
    let count = if items.is_empty() {
        0
    } else {
        items.len().div_ceil(size)
    };

    Batches {
        remaining: items.into_iter(),
        size,
        next_index: 1,
        count,
    }
}

impl Batches {
    /// Total number of batches, fixed when the iterator is created.
    pub fn batch_count(&self) -> usize {
        self.count
    }

    /// Effective number of items per full batch.
    pub fn batch_size(&self) -> usize {
        self.size
    }
}

impl Iterator for Batches {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.next_index > self.count {
            return None;
        }

        let items: Vec<Profile> = self.remaining.by_ref().take(self.size).collect();
        let batch = Batch {
            batch_index: self.next_index,
            batch_count: self.count,
            items,
        };
        self.next_index += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count + 1 - self.next_index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Batches {}
