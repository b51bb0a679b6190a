use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::{ItemId, SuccessorId, VersionId};

/// Source of globally unique, strictly positive identifiers.
///
/// Item and version ids share one id space. `0` is reserved as the
/// "no parent" sentinel and must never be returned.
pub trait IdGenerator: Send + Sync {
    /// Fresh item id.
    fn generate_item_id(&self) -> ItemId;
    /// Fresh version id.
    fn generate_version_id(&self) -> VersionId;
    /// Fresh successor edge id.
    fn generate_successor_id(&self) -> SuccessorId;
}

/// Counter-backed generator, optionally striped across several writers.
///
/// With `num_machines = n` and `machine_id = m`, every id `x` produced by
/// this instance satisfies `x % n == m`, so independent processes never
/// collide as long as each is configured with a distinct machine id.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    machine_id: u64,
    num_machines: u64,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    /// Single-writer generator starting at 1.
    pub fn new() -> Self {
        Self::striped(0, 1)
    }

    /// Generator for writer `machine_id` of `num_machines`. `num_machines` is
    /// clamped to at least 1.
    pub fn striped(machine_id: u64, num_machines: u64) -> Self {
        let num_machines = num_machines.max(1);
        Self {
            machine_id: machine_id % num_machines,
            num_machines,
            counter: AtomicU64::new(1),
        }
    }

    /// Resumes numbering so that every generated id is greater than `max_seen`.
    pub fn resume_after(self, max_seen: u64) -> Self {
        self.counter
            .store(max_seen / self.num_machines + 1, Ordering::SeqCst);
        self
    }

    fn next(&self) -> u64 {
        let slot = self.counter.fetch_add(1, Ordering::SeqCst);
        slot * self.num_machines + self.machine_id
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate_item_id(&self) -> ItemId {
        self.next()
    }

    fn generate_version_id(&self) -> VersionId {
        self.next()
    }

    fn generate_successor_id(&self) -> SuccessorId {
        self.next()
    }
}
