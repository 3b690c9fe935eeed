//! Scratch buffer layout shared by the CPU model and the WGSL kernel.
//!
//! Every group owns eight consecutive `u32` slots in the aggregate store and
//! one status word in the flag store:
//!
//! | slots   | contents                                   |
//! |---------|--------------------------------------------|
//! | `0..4`  | inclusive prefix (f32 bit patterns, RGBA)  |
//! | `4..8`  | local aggregate (f32 bit patterns, RGBA)   |
//!
//! A status word packs the dispatch epoch above a two bit [`GroupStatus`]:
//! `(epoch << STATUS_BITS) | status`. A word tagged with another epoch is
//! stale and reads as [`GroupStatus::NotReady`].
//!
//! This is an internal convention between the kernel and its host, not a
//! public format.

/// Number of workers per group in the GPU kernel.
pub const WORKGROUP_SIZE: u32 = 256;

/// `u32` slots reserved per group in the aggregate store.
pub const SLOTS_PER_GROUP: usize = 8;
/// Offset of the inclusive prefix inside a group's slots.
pub const PREFIX_OFFSET: usize = 0;
/// Offset of the local aggregate inside a group's slots.
pub const AGGREGATE_OFFSET: usize = 4;

/// Low bits of a status word holding the [`GroupStatus`].
pub const STATUS_BITS: u32 = 2;
const STATUS_MASK: u32 = (1 << STATUS_BITS) - 1;
/// Largest epoch representable in a status word.
pub const MAX_EPOCH: u32 = u32::MAX >> STATUS_BITS;

/// Publication state of one group within a dispatch.
///
/// Only moves forward within a dispatch: `NotReady` -> `AggregateReady` ->
/// `PrefixReady`. Group 0 skips `AggregateReady`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u32)]
pub enum GroupStatus {
    NotReady = 0,
    AggregateReady = 1,
    PrefixReady = 2,
}

impl GroupStatus {
    /// Packs `self` with `epoch` into a status word.
    pub fn tag(self, epoch: u32) -> u32 {
        debug_assert!(epoch <= MAX_EPOCH);
        (epoch << STATUS_BITS) | self as u32
    }

    /// Reads a status word as seen by a dispatch running under `epoch`.
    pub fn untag(word: u32, epoch: u32) -> Self {
        if word >> STATUS_BITS != epoch {
            return Self::NotReady;
        }
        match word & STATUS_MASK {
            1 => Self::AggregateReady,
            2 => Self::PrefixReady,
            _ => Self::NotReady,
        }
    }
}

/// Returns the epoch that follows `epoch`, skipping 0 so that zeroed scratch
/// buffers never look like a live dispatch.
pub fn next_epoch(epoch: u32) -> u32 {
    if epoch >= MAX_EPOCH { 1 } else { epoch + 1 }
}

/// Number of groups needed to cover `pixel_count` pixels when each worker
/// handles `sequencing_factor` of them. Never less than one: the last group
/// is the one that finalizes, so a dispatch always has one.
pub fn group_count(pixel_count: usize, workgroup_size: u32, sequencing_factor: u32) -> u32 {
    let per_group = workgroup_size as usize * sequencing_factor as usize;
    pixel_count.div_ceil(per_group).max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_word_round_trip() {
        for status in [
            GroupStatus::NotReady,
            GroupStatus::AggregateReady,
            GroupStatus::PrefixReady,
        ] {
            assert_eq!(GroupStatus::untag(status.tag(7), 7), status);
        }
    }

    #[test]
    fn stale_epoch_reads_not_ready() {
        let word = GroupStatus::PrefixReady.tag(3);
        assert_eq!(GroupStatus::untag(word, 4), GroupStatus::NotReady);
        // zeroed scratch
        assert_eq!(GroupStatus::untag(0, 1), GroupStatus::NotReady);
    }

    #[test]
    fn epochs_wrap_past_zero() {
        assert_eq!(next_epoch(0), 1);
        assert_eq!(next_epoch(41), 42);
        assert_eq!(next_epoch(MAX_EPOCH), 1);
    }

    #[test]
    fn group_count_covers_every_pixel() {
        assert_eq!(group_count(1024, 256, 1), 4);
        assert_eq!(group_count(1025, 256, 1), 5);
        assert_eq!(group_count(4, 256, 24), 1);
        assert_eq!(group_count(0, 256, 24), 1);
        assert_eq!(group_count(256 * 24 * 3, 256, 24), 3);
    }
}
