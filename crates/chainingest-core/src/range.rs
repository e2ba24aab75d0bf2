//! Inclusive height ranges, fast-sync chunk planning and progress math.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

use crate::types::Height;

/// An inclusive range of block heights. Empty when `start > end`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockRange {
    pub start: Height,
    pub end: Height,
}

impl BlockRange {
    pub fn new(start: Height, end: Height) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Iterate every height in `[start, end]`, lowest first.
    pub fn heights(&self) -> Heights {
        Heights {
            next: self.start.clone(),
            last: self.end.clone(),
        }
    }

    /// Split the range into barrier chunks of `pool × size` heights, each
    /// carrying up to `pool` contiguous worker sub-ranges of `size` heights.
    ///
    /// Worker sub-ranges that would start past `end` are not produced, and
    /// the final sub-range is clipped at `end`. A zero `pool` or `size`
    /// yields no chunks.
    pub fn chunks(&self, pool: usize, size: usize) -> Chunks {
        Chunks {
            next: self.start.clone(),
            end: self.end.clone(),
            pool,
            size: BigUint::from(size),
            width: BigUint::from(pool) * BigUint::from(size),
        }
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Iterator over the heights of a [`BlockRange`].
pub struct Heights {
    next: Height,
    last: Height,
}

impl Iterator for Heights {
    type Item = Height;

    fn next(&mut self) -> Option<Height> {
        if self.next > self.last {
            return None;
        }
        let current = self.next.clone();
        self.next += 1u32;
        Some(current)
    }
}

/// One barrier-synchronized unit of a fast sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Heights covered by this chunk, clipped at the sync end.
    pub range: BlockRange,
    /// Contiguous per-worker sub-ranges, in height order.
    pub workers: Vec<BlockRange>,
}

/// Iterator produced by [`BlockRange::chunks`].
pub struct Chunks {
    next: Height,
    end: Height,
    pool: usize,
    size: Height,
    width: Height,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.width.is_zero() || self.next > self.end {
            return None;
        }
        let begin = self.next.clone();
        let mut workers = Vec::new();
        let mut worker_begin = begin.clone();
        for _ in 0..self.pool {
            if worker_begin > self.end {
                break;
            }
            let worker_end = (&worker_begin + &self.size - 1u32).min(self.end.clone());
            let following = &worker_end + 1u32;
            workers.push(BlockRange::new(worker_begin, worker_end));
            worker_begin = following;
        }
        let chunk_end = (&begin + &self.width - 1u32).min(self.end.clone());
        self.next = &begin + &self.width;
        Some(Chunk {
            range: BlockRange::new(begin, chunk_end),
            workers,
        })
    }
}

/// Sync percentage: `floor(current × 100 / end)`, clamped to 100.
/// A zero `end` is a degenerate sync and always reports 100.
pub fn sync_percent(current: &Height, end: &Height) -> u8 {
    if end.is_zero() {
        return 100;
    }
    let pct = (current * 100u32) / end;
    pct.to_u8().map(|p| p.min(100)).unwrap_or(100)
}
