//! Fork watcher: keeps a bounded window of recently applied blocks and
//! flags new blocks whose parent hash disagrees with what was recorded.
//!
//! The watcher is a detector only. It never rewinds anything; consumers see
//! [`BlockEvent::is_fork`] and decide what to do. Reorgs deeper than the
//! window cannot be seen: once the parent height has been evicted there is
//! no evidence either way and no verdict is made.

use std::collections::{HashMap, VecDeque};

use num_traits::Zero;

use crate::types::{BlockEvent, Height};

/// What the window remembers about one applied block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkRecord {
    pub number: Height,
    pub hash: String,
    pub parent_hash: String,
}

impl From<&BlockEvent> for ForkRecord {
    fn from(ev: &BlockEvent) -> Self {
        Self {
            number: ev.number().clone(),
            hash: ev.hash().to_string(),
            parent_hash: ev.parent_hash().to_string(),
        }
    }
}

/// Fixed-capacity FIFO of [`ForkRecord`]s keyed by height.
///
/// `order` holds heights in insertion order, `records` indexes them. Both
/// stay at most `capacity` long; eviction pops the oldest insertion.
pub struct ForkWindow {
    order: VecDeque<Height>,
    records: HashMap<Height, ForkRecord>,
    capacity: usize,
}

impl ForkWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            records: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a block. Re-applying a height already in the window replaces
    /// its record but keeps its original eviction slot.
    pub fn insert(&mut self, record: ForkRecord) {
        if self.capacity == 0 {
            return;
        }
        if let Some(existing) = self.records.get_mut(&record.number) {
            *existing = record;
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.records.remove(&oldest);
            }
        }
        self.order.push_back(record.number.clone());
        self.records.insert(record.number.clone(), record);
    }

    pub fn get(&self, number: &Height) -> Option<&ForkRecord> {
        self.records.get(number)
    }

    /// Number of records in the window.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Detects blocks that do not extend the previously observed chain.
pub struct ForkWatcher {
    window: ForkWindow,
}

impl ForkWatcher {
    /// `max_fork_size` bounds both memory and the deepest detectable reorg.
    pub fn new(max_fork_size: usize) -> Self {
        Self {
            window: ForkWindow::new(max_fork_size),
        }
    }

    /// Compare `event` against the recorded block at `number - 1` and set
    /// its fork flag. Returns the flag.
    pub fn check_fork(&self, event: &mut BlockEvent) -> bool {
        if event.number().is_zero() {
            return false;
        }
        let parent_number = event.number() - 1u32;
        let Some(parent) = self.window.get(&parent_number) else {
            return false;
        };
        if parent.hash != event.parent_hash() {
            tracing::warn!(
                block = %event.number(),
                expected_parent = %parent.hash,
                actual_parent = %event.parent_hash(),
                "Fork detected"
            );
            event.set_fork(true);
        }
        event.is_fork()
    }

    /// Record an accepted block.
    pub fn apply(&mut self, record: ForkRecord) {
        self.window.insert(record);
    }

    pub fn window(&self) -> &ForkWindow {
        &self.window
    }
}
