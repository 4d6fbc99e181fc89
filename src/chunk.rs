//! Batching of the row stream.

use crate::source::Row;

/// A bounded group of rows loaded and committed as one unit.
#[derive(Debug, Clone)]
pub struct Batch {
    /// 0-based sequential index in production order.
    pub index: usize,
    pub rows: Vec<Row>,
}

impl Batch {
    /// Inclusive sheet-row span covered by this batch.
    pub fn row_span(&self) -> (usize, usize) {
        let first = self.rows.first().map(|r| r.number).unwrap_or(0);
        let last = self.rows.last().map(|r| r.number).unwrap_or(0);
        (first, last)
    }
}

/// Groups a row iterator into batches of `size` rows, the last one possibly
/// smaller. Buffers at most one batch, so peak memory tracks the chunk size
/// rather than the file size. An exhausted input yields no batch; empty
/// batches are never produced.
pub struct Chunker<I> {
    rows: I,
    size: usize,
    next_index: usize,
}

impl<I: Iterator<Item = Row>> Chunker<I> {
    pub fn new(rows: I, size: usize) -> Self {
        assert!(size > 0, "chunk size must be positive");
        Self {
            rows,
            size,
            next_index: 0,
        }
    }
}

impl<I: Iterator<Item = Row>> Iterator for Chunker<I> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let mut rows = Vec::with_capacity(self.size);
        while rows.len() < self.size {
            match self.rows.next() {
                Some(row) => rows.push(row),
                None => break,
            }
        }

        if rows.is_empty() {
            return None;
        }

        let index = self.next_index;
        self.next_index += 1;
        Some(Batch { index, rows })
    }
}
