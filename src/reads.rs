//! # Reads Module
//!
//! Keeps the spans of the reads that built a chromosome's coverage array, in
//! arrival order, so that the number of reads starting inside a window can be
//! counted without rescanning the alignments.
//!
//! Range queries are driven by a [`ReadCursor`] owned by the caller. When the
//! caller issues queries with non-decreasing begin positions the cursor only
//! ever moves forward and each query costs amortised O(1); out-of-order
//! queries still return the right count, they just walk further.
use crate::errors::{Error, Result};
use std::fmt;

/// A mapped read, 1-based inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSpan {
    pub start: i64,
    pub end: i64,
}

impl ReadSpan {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }
}

impl fmt::Display for ReadSpan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

/// Position of a caller inside a [`ReadPositionIndex`].
///
/// A cursor is only meaningful for the index that produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCursor(usize);

impl ReadCursor {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Append-only list of read spans ordered by start position.
#[derive(Debug, Default)]
pub struct ReadPositionIndex {
    entries: Vec<ReadSpan>,
}

impl ReadPositionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a read. Reads must arrive sorted by start position.
    pub fn add_read(&mut self, start: i64, end: i64) -> Result<()> {
        if let Some(last) = self.entries.last() {
            if start < last.start {
                return Err(Error::OutOfOrderInput {
                    msg: format!(
                        "read starting at {} arrived after a read starting at {}",
                        start, last.start
                    ),
                });
            }
        }
        self.entries.push(ReadSpan::new(start, end));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReadSpan> {
        self.entries.iter()
    }

    /// The smallest start and largest end seen, or `None` when empty.
    pub fn span(&self) -> Option<(i64, i64)> {
        let first = self.entries.first()?;
        let max_end = self.entries.iter().map(|r| r.end).max()?;
        Some((first.start, max_end))
    }

    /// Reads per base over the covered span.
    pub fn average_density(&self) -> Option<f64> {
        let (beg, end) = self.span()?;
        let width = end - beg + 1;
        Some(self.entries.len() as f64 / width as f64)
    }

    /// Mean length of the indexed reads.
    pub fn average_read_length(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        let total: i64 = self.iter().map(ReadSpan::len).sum();
        Some(total as f64 / self.len() as f64)
    }

    /// Binary search for a cursor pointing at the first read starting at or
    /// after `begin_pos`.
    pub fn seek(&self, begin_pos: i64) -> ReadCursor {
        ReadCursor(self.entries.partition_point(|r| r.start < begin_pos))
    }

    /// Count the reads whose start lies in `[begin_pos, end_pos]`.
    ///
    /// The cursor is first walked back over any reads it overshot during a
    /// previous query, then forward to the first read starting at or after
    /// `begin_pos`. On return it points just past the last counted read.
    pub fn count_in_range(&self, begin_pos: i64, end_pos: i64, cursor: &mut ReadCursor) -> usize {
        let limit = self.entries.len();
        let mut r1 = cursor.0.min(limit);
        while r1 > 0 && self.entries[r1 - 1].start >= begin_pos {
            r1 -= 1;
        }
        while r1 < limit && self.entries[r1].start < begin_pos {
            r1 += 1;
        }
        let mut r2 = r1;
        while r2 < limit && self.entries[r2].start <= end_pos {
            r2 += 1;
        }
        cursor.0 = r2;
        r2 - r1
    }
}
