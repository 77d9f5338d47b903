//! Deferred impulses: recorded by agents in parallel, applied once by a single consumer.
//!
//! Each agent slot owns one [`ImpulseWriter`]. Writers are handed out as disjoint `&mut`
//! borrows of the channel, so producers can never share a buffer, and [`ImpulseChannel::apply`]
//! takes the channel by value, so nothing is applied while a writer is still borrowed.

use crate::bodies::RigidBodyStore;
use crate::collision::{BodyIndex, Point, Vec3};

/// One momentum change to apply to `body` at world point `point`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeferredImpulse {
    pub body: BodyIndex,
    pub impulse: Vec3,
    pub point: Point,
}

/// Append-only impulse buffer of one agent slot.
#[derive(Clone, Debug, Default)]
pub struct ImpulseWriter {
    impulses: Vec<DeferredImpulse>,
}

impl ImpulseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, body: BodyIndex, impulse: Vec3, point: Point) {
        self.impulses.push(DeferredImpulse {
            body,
            impulse,
            point,
        });
    }

    pub fn len(&self) -> usize {
        self.impulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.impulses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeferredImpulse> {
        self.impulses.iter()
    }
}

/// Multi-producer, single-consumer impulse queue partitioned by agent slot.
#[derive(Clone, Debug, Default)]
pub struct ImpulseChannel {
    partitions: Vec<ImpulseWriter>,
}

impl ImpulseChannel {
    /// Reserve one partition per agent slot.
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: vec![ImpulseWriter::new(); partitions],
        }
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Total recorded impulses across all partitions.
    pub fn len(&self) -> usize {
        self.partitions.iter().map(ImpulseWriter::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.iter().all(ImpulseWriter::is_empty)
    }

    /// One writer per partition, indexed like the agent batch.
    #[inline]
    pub fn writers_mut(&mut self) -> &mut [ImpulseWriter] {
        &mut self.partitions
    }

    /// Apply every recorded impulse to `store`, partition by partition. Returns how many were
    /// applied.
    pub fn apply(self, store: &mut impl RigidBodyStore) -> usize {
        let mut applied = 0;
        for impulse in self.drain() {
            store.apply_impulse(impulse.body, &impulse.impulse, &impulse.point);
            applied += 1;
        }
        if applied > 0 {
            log::trace!("applied {applied} deferred impulses");
        }
        applied
    }

    /// Consume the channel, yielding impulses in partition order.
    pub fn drain(self) -> impl Iterator<Item = DeferredImpulse> {
        self.partitions.into_iter().flat_map(|p| p.impulses)
    }
}
