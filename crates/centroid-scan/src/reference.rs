//! Sequential reference model of the centroid update, used to check the
//! parallel one.
//!
//! Sums are accumulated in `f64` in pixel order, so they are reproducible and
//! at least as accurate as any grouping the kernel can produce.

use crate::config::{EmptyClusterPolicy, RunParams};
use crate::finalize::centroid_shift;
use crate::image::PixelGrid;
use glam::{DVec4, Vec4};

/// Sum of `(r, g, b, 1)` over the pixels assigned to `cluster`.
pub fn cluster_total(pixels: &PixelGrid, assignment: &[u32], cluster: u32) -> DVec4 {
    pixels
        .colors()
        .iter()
        .zip(assignment)
        .filter(|&(_, &assigned)| assigned == cluster)
        .map(|(color, _)| color.truncate().extend(1.0).as_dvec4())
        .sum()
}

/// Result of updating one centroid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReferenceUpdate {
    pub centroid: Vec4,
    /// `None` when the slot keeps its previous value.
    pub converged: Option<bool>,
}

/// Updates `previous` from the pixels of `cluster`, the way finalization does.
pub fn reference_update(
    pixels: &PixelGrid,
    assignment: &[u32],
    cluster: u32,
    previous: Vec4,
    params: &RunParams,
) -> ReferenceUpdate {
    let total = cluster_total(pixels, assignment, cluster);
    if total.w > 0.0 {
        let centroid = (total / total.w).as_vec4();
        ReferenceUpdate {
            centroid,
            converged: Some(centroid_shift(previous, centroid) < params.epsilon),
        }
    } else {
        ReferenceUpdate {
            centroid: previous,
            converged: match params.empty_cluster {
                EmptyClusterPolicy::Converged => Some(true),
                EmptyClusterPolicy::NotConverged => Some(false),
                EmptyClusterPolicy::Unchanged => None,
            },
        }
    }
}

/// One full round over every centroid: the updated table and the number of
/// converged centroids, given the convergence slots left by the previous
/// round.
pub fn reference_round(
    pixels: &PixelGrid,
    assignment: &[u32],
    centroids: &[Vec4],
    previous_slots: &[u32],
    params: &RunParams,
) -> (Vec<Vec4>, u32) {
    let mut converged = 0;
    let updated = (0..)
        .zip(centroids)
        .map(|(cluster, &previous)| {
            let update = reference_update(pixels, assignment, cluster, previous, params);
            let slot = match update.converged {
                Some(converged) => u32::from(converged),
                None => previous_slots.get(cluster as usize).copied().unwrap_or(0),
            };
            converged += slot;
            update.centroid
        })
        .collect();
    (updated, converged)
}
