use crate::layout::{AGGREGATE_OFFSET, GroupStatus, PREFIX_OFFSET, SLOTS_PER_GROUP};
use crate::slots::{load_vec4, store_vec4};
use glam::Vec4;
use std::sync::atomic::{AtomicU32, Ordering, fence};

/// Per-group scratch shared between the groups of one dispatch: a status word
/// and eight aggregate slots per group, see [`crate::layout`].
///
/// Only the last lane of group `g` writes group `g`'s entries. Values are
/// published before the status word with a release fence in between, and
/// readers issue an acquire fence after loading a status word, so observing
/// a status implies observing the values it announces.
#[derive(Debug)]
pub struct GroupStore {
    flags: Vec<AtomicU32>,
    slots: Vec<AtomicU32>,
}

impl GroupStore {
    pub fn new(groups: u32) -> Self {
        Self {
            flags: (0..groups).map(|_| AtomicU32::new(0)).collect(),
            slots: (0..groups as usize * SLOTS_PER_GROUP)
                .map(|_| AtomicU32::new(0))
                .collect(),
        }
    }

    /// Number of groups this store has room for.
    pub fn groups(&self) -> u32 {
        self.flags.len() as u32
    }

    fn cells(&self, group: u32, offset: usize) -> &[AtomicU32] {
        let base = group as usize * SLOTS_PER_GROUP + offset;
        &self.slots[base..base + 4]
    }

    /// Dispatch entry: the owning group marks itself `NotReady` for `epoch`.
    pub fn reset(&self, group: u32, epoch: u32) {
        self.flags[group as usize].store(GroupStatus::NotReady.tag(epoch), Ordering::Relaxed);
        fence(Ordering::SeqCst);
    }

    pub fn publish_aggregate(&self, group: u32, aggregate: Vec4) {
        store_vec4(self.cells(group, AGGREGATE_OFFSET), aggregate);
    }

    pub fn publish_prefix(&self, group: u32, inclusive_prefix: Vec4) {
        store_vec4(self.cells(group, PREFIX_OFFSET), inclusive_prefix);
    }

    /// Announces `status`; everything published before this call becomes
    /// visible to any group that observes it.
    pub fn set_status(&self, group: u32, status: GroupStatus, epoch: u32) {
        fence(Ordering::Release);
        self.flags[group as usize].store(status.tag(epoch), Ordering::Relaxed);
    }

    pub fn status(&self, group: u32, epoch: u32) -> GroupStatus {
        let word = self.flags[group as usize].load(Ordering::Relaxed);
        fence(Ordering::Acquire);
        GroupStatus::untag(word, epoch)
    }

    /// Meaningful once `status` reported `AggregateReady` or later.
    pub fn aggregate(&self, group: u32) -> Vec4 {
        load_vec4(self.cells(group, AGGREGATE_OFFSET))
    }

    /// Meaningful once `status` reported `PrefixReady`.
    pub fn prefix(&self, group: u32) -> Vec4 {
        load_vec4(self.cells(group, PREFIX_OFFSET))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_is_not_ready() {
        let store = GroupStore::new(2);
        assert_eq!(store.status(0, 1), GroupStatus::NotReady);
        assert_eq!(store.status(1, 1), GroupStatus::NotReady);
    }

    #[test]
    fn slots_do_not_overlap() {
        let store = GroupStore::new(2);
        store.publish_aggregate(0, Vec4::splat(1.0));
        store.publish_prefix(0, Vec4::splat(2.0));
        store.publish_aggregate(1, Vec4::splat(3.0));
        store.publish_prefix(1, Vec4::splat(4.0));
        assert_eq!(store.aggregate(0), Vec4::splat(1.0));
        assert_eq!(store.prefix(0), Vec4::splat(2.0));
        assert_eq!(store.aggregate(1), Vec4::splat(3.0));
        assert_eq!(store.prefix(1), Vec4::splat(4.0));
    }

    #[test]
    fn status_from_a_previous_dispatch_is_stale() {
        let store = GroupStore::new(1);
        store.set_status(0, GroupStatus::PrefixReady, 5);
        assert_eq!(store.status(0, 5), GroupStatus::PrefixReady);
        assert_eq!(store.status(0, 6), GroupStatus::NotReady);

        store.reset(0, 6);
        assert_eq!(store.status(0, 6), GroupStatus::NotReady);
        store.set_status(0, GroupStatus::AggregateReady, 6);
        assert_eq!(store.status(0, 6), GroupStatus::AggregateReady);
    }
}
