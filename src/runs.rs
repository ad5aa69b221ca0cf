//! Enumeration of the linear chunk-index runs a read region touches
//!
//! Chunks are numbered row-major over the chunk grid, so fixing every axis but
//! the last and sweeping the last one always gives a contiguous index range.
//! `ChunkRuns` walks those rows with an odometer over the leading axes and
//! coalesces rows that happen to touch, yielding maximal `[lower, upper)` runs.

use crate::geometry::{ArrayGeometry, ReadRegion};
use std::ops::Range;

/// Iterator over maximal contiguous chunk-index runs intersecting a region
#[derive(Debug, Clone)]
pub struct ChunkRuns {
    grid: Vec<u64>,
    lo: Vec<u64>,
    hi: Vec<u64>,
    /// Odometer over all axes; the last axis stays at `lo`
    cursor: Vec<u64>,
    exhausted: bool,
    lookahead: Option<Range<u64>>,
}

impl ChunkRuns {
    /// Runs of `geometry` chunks touched by `region`
    pub fn new(geometry: &ArrayGeometry, region: &ReadRegion) -> Self {
        let chunks = geometry.chunk_shape();
        let lo: Vec<u64> = region
            .offset
            .iter()
            .zip(chunks.iter())
            .map(|(&o, &c)| o / c)
            .collect();
        let hi: Vec<u64> = region
            .offset
            .iter()
            .zip(region.count.iter())
            .zip(chunks.iter())
            .map(|((&o, &n), &c)| (o + n).saturating_sub(1) / c)
            .collect();

        Self {
            grid: geometry.grid_shape().to_vec(),
            cursor: lo.clone(),
            lo,
            hi,
            exhausted: region.is_empty(),
            lookahead: None,
        }
    }

    /// Run for the current odometer state, then advance the odometer
    fn next_row(&mut self) -> Option<Range<u64>> {
        if self.exhausted {
            return None;
        }

        let last = self.grid.len() - 1;
        let lower = self
            .cursor
            .iter()
            .zip(self.grid.iter())
            .fold(0, |index, (&c, &n)| index * n + c);
        let row = lower..lower + (self.hi[last] - self.lo[last] + 1);

        // Carry over the leading axes, fastest first
        let mut axis = last;
        loop {
            if axis == 0 {
                self.exhausted = true;
                break;
            }
            axis -= 1;
            self.cursor[axis] += 1;
            if self.cursor[axis] <= self.hi[axis] {
                break;
            }
            self.cursor[axis] = self.lo[axis];
        }

        Some(row)
    }
}

impl Iterator for ChunkRuns {
    type Item = Range<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut run = match self.lookahead.take() {
            Some(run) => run,
            None => self.next_row()?,
        };
        while let Some(row) = self.next_row() {
            if row.start == run.end {
                run.end = row.end;
            } else {
                self.lookahead = Some(row);
                break;
            }
        }
        Some(run)
    }
}
