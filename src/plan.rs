//! Read planning - merging sparse positions into bounded I/O requests
//!
//! The same state machine runs twice per decode: once over LUT super-chunks
//! and once over chunk payloads. Each call to `advance` opens a pending read
//! from the next candidate, folds in following candidates while the gap stays
//! within `merge` and the total within `max`, and leaves the first rejected
//! candidate in the lookahead for the next call.

use crate::runs::ChunkRuns;
use std::marker::PhantomData;
use std::ops::Range;

/// Merge thresholds for planned reads, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoLimits {
    /// Largest gap between two reads that still merges them
    pub merge: u64,
    /// Largest merged read
    pub max: u64,
}

impl IoLimits {
    pub fn new(merge: u64, max: u64) -> Self {
        Self { merge, max }
    }
}

impl Default for IoLimits {
    fn default() -> Self {
        Self {
            merge: 512,
            max: 65536,
        }
    }
}

/// Index-read unit: one LUT super-chunk
#[derive(Debug, Clone, Copy)]
pub struct LutUnit;

/// Data-read unit: one chunk payload
#[derive(Debug, Clone, Copy)]
pub struct ChunkUnit;

/// A position the planner may add to the pending read
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub offset: u64,
    pub end: u64,
    pub units: Range<u64>,
    /// First chunk index not covered once this candidate is taken
    pub chunks_end: u64,
}

/// Lookahead over the chunk runs still to be planned
#[derive(Debug, Clone)]
pub(crate) struct Cursor {
    runs: ChunkRuns,
    next_chunk: Range<u64>,
    bound: u64,
}

impl Cursor {
    pub fn new(runs: ChunkRuns) -> Self {
        let mut cursor = Self {
            runs,
            next_chunk: 0..0,
            bound: u64::MAX,
        };
        cursor.refill();
        cursor
    }

    /// Stop before chunk index `bound`
    pub fn bounded(mut self, bound: u64) -> Self {
        self.bound = bound;
        self.next_chunk.end = self.next_chunk.end.min(bound);
        self.refill();
        self
    }

    fn refill(&mut self) {
        if self.next_chunk.is_empty() {
            self.next_chunk = match self.runs.next() {
                Some(run) if run.start < self.bound => run.start..run.end.min(self.bound),
                _ => 0..0,
            };
        }
    }

    fn consume(&mut self, upto: u64) {
        self.next_chunk.start = upto.min(self.next_chunk.end);
        self.refill();
    }

    /// Chunk indices that still have to be planned, as a span
    pub fn remaining(&self) -> Range<u64> {
        if self.next_chunk.is_empty() {
            return 0..0;
        }
        self.next_chunk.start..self.bound
    }
}

#[derive(Debug)]
struct Pending {
    offset: u64,
    end: u64,
    units: Range<u64>,
    chunks_end: u64,
}

impl Pending {
    fn accepts(&self, candidate: &Candidate, limits: IoLimits) -> bool {
        // Already fetched bytes never grow the read
        if candidate.offset >= self.offset && candidate.end <= self.end {
            return true;
        }
        let gap = candidate.offset.saturating_sub(self.end);
        let total = candidate.end.max(self.end).saturating_sub(self.offset);
        gap <= limits.merge && total <= limits.max
    }

    fn extend(&mut self, candidate: Candidate) {
        self.end = self.end.max(candidate.end);
        self.units.end = self.units.end.max(candidate.units.end);
        self.chunks_end = candidate.chunks_end;
    }
}

/// Cursor over one planning phase
///
/// Between successful `next_*_read` calls, `offset`/`count` is the byte range
/// to fetch, `index_range` the units it holds (super-chunks for index reads,
/// chunks for data reads) and `chunk_index` the chunk span it covers.
#[derive(Debug, Clone)]
pub struct ReadPlanState<U> {
    pub offset: u64,
    pub count: u64,
    pub index_range: Range<u64>,
    pub chunk_index: Range<u64>,
    cursor: Cursor,
    start: Option<Cursor>,
    _unit: PhantomData<U>,
}

/// Planner state over LUT bytes
pub type IndexRead = ReadPlanState<LutUnit>;

/// Planner state over chunk payload bytes
pub type DataRead = ReadPlanState<ChunkUnit>;

impl<U> ReadPlanState<U> {
    pub(crate) fn new(cursor: Cursor) -> Self {
        Self {
            offset: 0,
            count: 0,
            index_range: 0..0,
            chunk_index: 0..0,
            cursor,
            start: None,
            _unit: PhantomData,
        }
    }

    pub(crate) fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Plan the next read; false once every candidate has been flushed
    pub(crate) fn advance<F>(&mut self, limits: IoLimits, mut peek: F) -> bool
    where
        F: FnMut(&Range<u64>) -> Option<Candidate>,
    {
        let Some(first) = peek(&self.cursor.next_chunk) else {
            return false;
        };

        let start = self.cursor.clone();
        let first_chunk = self.cursor.next_chunk.start;
        self.cursor.consume(first.chunks_end);
        let mut pending = Pending {
            offset: first.offset,
            end: first.end,
            units: first.units,
            chunks_end: first.chunks_end,
        };

        while let Some(candidate) = peek(&self.cursor.next_chunk) {
            if !pending.accepts(&candidate, limits) {
                break;
            }
            let upto = candidate.chunks_end;
            pending.extend(candidate);
            self.cursor.consume(upto);
        }

        self.offset = pending.offset;
        self.count = pending.end - pending.offset;
        self.index_range = pending.units;
        self.chunk_index = first_chunk..pending.chunks_end;
        self.start = Some(start);
        true
    }
}

impl IndexRead {
    /// Cursor over the chunks this index read located, for its data reads
    pub(crate) fn data_cursor(&self) -> Cursor {
        match &self.start {
            Some(start) => start.clone().bounded(self.chunk_index.end),
            None => self.cursor.clone().bounded(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ArrayGeometry, ReadRegion};

    /// One candidate per chunk, `size` bytes each, laid out back to back
    fn fixed_size_peek(size: u64) -> impl FnMut(&Range<u64>) -> Option<Candidate> {
        move |next: &Range<u64>| {
            if next.is_empty() {
                return None;
            }
            let i = next.start;
            Some(Candidate {
                offset: i * size,
                end: (i + 1) * size,
                units: i..i + 1,
                chunks_end: i + 1,
            })
        }
    }

    fn cursor(dims: &[u64], chunks: &[u64], offset: &[u64], count: &[u64]) -> Cursor {
        let geometry = ArrayGeometry::new(dims.to_vec(), chunks.to_vec()).unwrap();
        let region = ReadRegion::new(offset.to_vec(), count.to_vec());
        Cursor::new(ChunkRuns::new(&geometry, &region))
    }

    fn collect_reads(state: &mut DataRead, limits: IoLimits, size: u64) -> Vec<(u64, u64, Range<u64>)> {
        let mut peek = fixed_size_peek(size);
        let mut reads = Vec::new();
        while state.advance(limits, &mut peek) {
            reads.push((state.offset, state.count, state.chunk_index.clone()));
        }
        reads
    }

    #[test]
    fn test_adjacent_chunks_merge() {
        let mut state = DataRead::new(cursor(&[100], &[10], &[0], &[100]));
        let reads = collect_reads(&mut state, IoLimits::new(0, 1000), 10);
        assert_eq!(reads, vec![(0, 100, 0..10)]);
    }

    #[test]
    fn test_max_splits_reads() {
        let mut state = DataRead::new(cursor(&[100], &[10], &[0], &[100]));
        let reads = collect_reads(&mut state, IoLimits::new(0, 35), 10);
        assert_eq!(
            reads,
            vec![(0, 30, 0..3), (30, 30, 3..6), (60, 30, 6..9), (90, 10, 9..10)]
        );
    }

    #[test]
    fn test_gap_threshold() {
        // grid 3x3, last two columns: runs 1..3, 4..6, 7..9 with one chunk gaps
        let runs = || cursor(&[6, 6], &[2, 2], &[0, 2], &[6, 4]);

        let mut state = DataRead::new(runs());
        let reads = collect_reads(&mut state, IoLimits::new(10, 1000), 10);
        assert_eq!(reads, vec![(10, 80, 1..9)]);

        let mut state = DataRead::new(runs());
        let reads = collect_reads(&mut state, IoLimits::new(9, 1000), 10);
        assert_eq!(reads, vec![(10, 20, 1..3), (40, 20, 4..6), (70, 20, 7..9)]);
    }

    #[test]
    fn test_oversize_candidate_stands_alone() {
        let mut state = DataRead::new(cursor(&[30], &[10], &[0], &[30]));
        let reads = collect_reads(&mut state, IoLimits::new(0, 5), 10);
        assert_eq!(reads, vec![(0, 10, 0..1), (10, 10, 1..2), (20, 10, 2..3)]);
    }

    #[test]
    fn test_contained_candidate_joins_oversize_read() {
        // every chunk maps to the same 80 bytes, larger than max
        let mut state = DataRead::new(cursor(&[6, 6], &[2, 2], &[0, 0], &[6, 2]));
        let mut peek = |next: &Range<u64>| {
            if next.is_empty() {
                return None;
            }
            Some(Candidate {
                offset: 1000,
                end: 1080,
                units: 0..1,
                chunks_end: next.end,
            })
        };
        let mut reads = Vec::new();
        while state.advance(IoLimits::new(512, 50), &mut peek) {
            reads.push((state.offset, state.count, state.chunk_index.clone()));
        }
        assert_eq!(reads, vec![(1000, 80, 0..7)]);
    }

    #[test]
    fn test_empty_region_plans_nothing() {
        let mut state = DataRead::new(cursor(&[30], &[10], &[5], &[0]));
        assert!(collect_reads(&mut state, IoLimits::default(), 10).is_empty());
    }

    #[test]
    fn test_bounded_cursor_stops() {
        let mut state = DataRead::new(cursor(&[100], &[10], &[0], &[100]).bounded(4));
        let reads = collect_reads(&mut state, IoLimits::default(), 10);
        assert_eq!(reads, vec![(0, 40, 0..4)]);
    }

    #[test]
    fn test_index_read_hands_over_its_chunks() {
        let mut index = IndexRead::new(cursor(&[100], &[10], &[0], &[100]));
        let mut peek = fixed_size_peek(10);
        assert!(index.advance(IoLimits::new(0, 30), &mut peek));
        assert!(index.advance(IoLimits::new(0, 30), &mut peek));
        assert_eq!(index.chunk_index, 3..6);

        let mut data = DataRead::new(index.data_cursor());
        let reads = collect_reads(&mut data, IoLimits::default(), 10);
        assert_eq!(reads, vec![(30, 30, 3..6)]);
    }
}
