use crate::config::{EmptyClusterPolicy, RunParams};
use crate::convergence::{CentroidTable, ConvergenceVector};
use glam::Vec4;
use tracing::debug;

/// What the finalizing worker did with the grand total of a cluster.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Finalization {
    /// The cluster had pixels: its centroid was replaced by their mean color.
    Updated {
        centroid: Vec4,
        /// Euclidean RGB distance between the previous and the new centroid.
        shift: f32,
        converged: bool,
    },
    /// No pixel is assigned to the cluster; the centroid was left alone.
    Empty { policy: EmptyClusterPolicy },
}

/// Mean color of a grand total, or `None` when nothing was counted.
///
/// The weight component of the result is `1.0`.
pub fn centroid_from_total(total: Vec4) -> Option<Vec4> {
    (total.w > 0.0).then(|| total / total.w)
}

/// Distance over the color components only.
pub fn centroid_shift(previous: Vec4, next: Vec4) -> f32 {
    previous.truncate().distance(next.truncate())
}

/// Finalization proper, run once per dispatch by the last lane of the last
/// group.
///
/// Returns the outcome and, when `cluster` is the last index of the table,
/// the number of converged centroids written to the trailing slot.
pub(crate) fn finalize(
    total: Vec4,
    cluster: u32,
    centroids: &CentroidTable,
    convergence: &ConvergenceVector,
    params: &RunParams,
) -> (Finalization, Option<u32>) {
    let finalization = match centroid_from_total(total) {
        Some(centroid) => {
            let shift = centroid_shift(centroids.get(cluster), centroid);
            let converged = shift < params.epsilon;
            centroids.set(cluster, centroid);
            convergence.record(cluster, converged);
            debug!(cluster, count = total.w, shift, converged, "centroid updated");
            Finalization::Updated {
                centroid,
                shift,
                converged,
            }
        }
        None => {
            let policy = params.empty_cluster;
            match policy {
                EmptyClusterPolicy::Converged => convergence.record(cluster, true),
                EmptyClusterPolicy::NotConverged => convergence.record(cluster, false),
                EmptyClusterPolicy::Unchanged => {}
            }
            debug!(cluster, ?policy, "cluster has no pixels");
            Finalization::Empty { policy }
        }
    };

    let round = (cluster + 1 == centroids.len()).then(|| {
        let converged = convergence.close_round();
        debug!(converged, count = centroids.len(), "round closed");
        converged
    });
    (finalization, round)
}
