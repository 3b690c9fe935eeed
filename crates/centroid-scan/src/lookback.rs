//! Decoupled look-back: how a group learns the sum of every group before it
//! without a cross-group barrier.
//!
//! Group `g` walks backwards from `g - 1`, one status read at a time:
//!
//! - `PrefixReady`: add that group's inclusive prefix and stop, it already
//!   covers everything before it.
//! - `AggregateReady`: add that group's local aggregate and move one group
//!   further back.
//! - `NotReady`: the group is still scanning; read the same flag again.
//!
//! Group 0 publishes its prefix without looking back, so the walk always
//! ends. Waiting only ever happens on a group that has started but not yet
//! finished its local scan.

use crate::layout::GroupStatus;
use crate::store::GroupStore;
use glam::Vec4;

/// Result of a single status read.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum LookBackPoll {
    /// Found a published aggregate and moved on to the previous group.
    Advanced,
    /// The group under the cursor has not published anything yet.
    Blocked { waiting_on: u32 },
    /// The exclusive prefix of the group doing the look-back.
    Ready(Vec4),
}

/// Resumable look-back of one group, driven by [`LookBack::poll`].
#[derive(Clone, Debug)]
pub struct LookBack {
    group: u32,
    cursor: u32,
    exclusive: Vec4,
}

impl LookBack {
    /// Starts the walk for `group`, which must not be group 0.
    pub fn new(group: u32) -> Self {
        debug_assert!(group > 0, "group 0 has no predecessors");
        Self {
            group,
            cursor: group - 1,
            exclusive: Vec4::ZERO,
        }
    }

    pub fn group(&self) -> u32 {
        self.group
    }

    /// Group whose status the next poll reads.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Reads one status word and acts on it.
    pub fn poll(&mut self, store: &GroupStore, epoch: u32) -> LookBackPoll {
        match store.status(self.cursor, epoch) {
            GroupStatus::PrefixReady => {
                self.exclusive += store.prefix(self.cursor);
                tracing::trace!(
                    group = self.group,
                    resolved_at = self.cursor,
                    "look-back resolved"
                );
                LookBackPoll::Ready(self.exclusive)
            }
            GroupStatus::AggregateReady => {
                self.exclusive += store.aggregate(self.cursor);
                // group 0 never stops at `AggregateReady`
                debug_assert!(self.cursor > 0);
                self.cursor = self.cursor.saturating_sub(1);
                LookBackPoll::Advanced
            }
            GroupStatus::NotReady => LookBackPoll::Blocked {
                waiting_on: self.cursor,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPOCH: u32 = 9;

    fn publish(store: &GroupStore, group: u32, aggregate: Vec4, prefix: Option<Vec4>) {
        store.publish_aggregate(group, aggregate);
        match prefix {
            Some(prefix) => {
                store.publish_prefix(group, prefix);
                store.set_status(group, GroupStatus::PrefixReady, EPOCH);
            }
            None => store.set_status(group, GroupStatus::AggregateReady, EPOCH),
        }
    }

    #[test]
    fn stops_at_the_nearest_prefix() {
        let store = GroupStore::new(4);
        publish(&store, 0, Vec4::splat(1.0), Some(Vec4::splat(1.0)));
        publish(&store, 1, Vec4::splat(2.0), Some(Vec4::splat(3.0)));
        publish(&store, 2, Vec4::splat(4.0), None);

        let mut lookback = LookBack::new(3);
        assert_eq!(lookback.poll(&store, EPOCH), LookBackPoll::Advanced);
        assert_eq!(lookback.cursor(), 1);
        assert_eq!(
            lookback.poll(&store, EPOCH),
            LookBackPoll::Ready(Vec4::splat(7.0))
        );
    }

    #[test]
    fn blocks_on_a_group_that_has_not_published() {
        let store = GroupStore::new(3);
        publish(&store, 0, Vec4::splat(1.0), Some(Vec4::splat(1.0)));

        let mut lookback = LookBack::new(2);
        assert_eq!(
            lookback.poll(&store, EPOCH),
            LookBackPoll::Blocked { waiting_on: 1 }
        );
        // still blocked, and nothing was accumulated while waiting
        assert_eq!(
            lookback.poll(&store, EPOCH),
            LookBackPoll::Blocked { waiting_on: 1 }
        );

        publish(&store, 1, Vec4::splat(2.0), None);
        assert_eq!(lookback.poll(&store, EPOCH), LookBackPoll::Advanced);
        assert_eq!(
            lookback.poll(&store, EPOCH),
            LookBackPoll::Ready(Vec4::splat(3.0))
        );
    }

    #[test]
    fn ignores_flags_left_by_a_previous_dispatch() {
        let store = GroupStore::new(2);
        store.publish_prefix(0, Vec4::splat(100.0));
        store.set_status(0, GroupStatus::PrefixReady, EPOCH - 1);

        let mut lookback = LookBack::new(1);
        assert_eq!(
            lookback.poll(&store, EPOCH),
            LookBackPoll::Blocked { waiting_on: 0 }
        );
    }
}
