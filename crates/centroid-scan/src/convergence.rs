use crate::slots::AtomicVec4;
use glam::Vec4;
use std::sync::atomic::{AtomicU32, Ordering};

/// Centroid colors, mutated in place by the single finalizing worker of each
/// dispatch.
#[derive(Debug)]
pub struct CentroidTable {
    centroids: Vec<AtomicVec4>,
}

impl CentroidTable {
    pub fn new(centroids: &[Vec4]) -> Self {
        Self {
            centroids: centroids.iter().copied().map(AtomicVec4::new).collect(),
        }
    }

    pub fn len(&self) -> u32 {
        self.centroids.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn get(&self, cluster: u32) -> Vec4 {
        self.centroids[cluster as usize].load()
    }

    pub(crate) fn set(&self, cluster: u32, centroid: Vec4) {
        self.centroids[cluster as usize].store(centroid);
    }

    pub fn to_vec(&self) -> Vec<Vec4> {
        self.centroids.iter().map(AtomicVec4::load).collect()
    }
}

/// One convergence slot per centroid plus a trailing slot holding how many
/// centroids converged in the last completed round.
///
/// Lifecycle: zeroed by [`ConvergenceVector::reset`] at the start of a
/// clustering iteration, each per-cluster slot written once per round by the
/// dispatch for that cluster, and the trailing slot written by the dispatch
/// for the last cluster.
#[derive(Debug)]
pub struct ConvergenceVector {
    slots: Vec<AtomicU32>,
}

impl ConvergenceVector {
    pub fn new(count: u32) -> Self {
        Self {
            slots: (0..=count).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Number of per-cluster slots.
    pub fn count(&self) -> u32 {
        self.slots.len() as u32 - 1
    }

    pub fn reset(&self) {
        for slot in &self.slots {
            slot.store(0, Ordering::Relaxed);
        }
    }

    pub fn get(&self, cluster: u32) -> u32 {
        self.slots[cluster as usize].load(Ordering::Acquire)
    }

    pub(crate) fn record(&self, cluster: u32, converged: bool) {
        self.slots[cluster as usize].store(u32::from(converged), Ordering::Release);
    }

    /// Sums the per-cluster slots into the trailing slot and returns the sum.
    pub(crate) fn close_round(&self) -> u32 {
        let count = self.count() as usize;
        let converged = self.slots[..count]
            .iter()
            .map(|slot| slot.load(Ordering::Acquire))
            .sum();
        self.slots[count].store(converged, Ordering::Release);
        converged
    }

    /// The trailing slot.
    pub fn converged_count(&self) -> u32 {
        self.slots[self.count() as usize].load(Ordering::Acquire)
    }

    /// True once a completed round found every centroid converged. Checked by
    /// every dispatch on entry.
    pub fn round_complete(&self) -> bool {
        self.converged_count() >= self.count()
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.slots
            .iter()
            .map(|slot| slot.load(Ordering::Acquire))
            .collect()
    }
}
