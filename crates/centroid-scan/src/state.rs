use crate::config::RunParams;
use crate::convergence::{CentroidTable, ConvergenceVector};
use crate::dispatch::{self, DispatchReport, Schedule};
use crate::error::DispatchError;
use crate::image::PixelGrid;
use crate::kernel::DispatchContext;
use crate::layout::{group_count, next_epoch};
use crate::store::GroupStore;
use glam::Vec4;

/// Buffers that persist across the dispatches of a clustering run: the
/// centroid table, the convergence vector and the per-group scratch.
#[derive(Debug)]
pub struct KMeansState {
    centroids: CentroidTable,
    convergence: ConvergenceVector,
    store: GroupStore,
    epoch: u32,
}

impl KMeansState {
    pub fn new(centroids: &[Vec4]) -> Result<Self, DispatchError> {
        if centroids.is_empty() {
            return Err(DispatchError::NoCentroids);
        }
        Ok(Self {
            centroids: CentroidTable::new(centroids),
            convergence: ConvergenceVector::new(centroids.len() as u32),
            store: GroupStore::new(0),
            epoch: 0,
        })
    }

    pub fn centroids(&self) -> Vec<Vec4> {
        self.centroids.to_vec()
    }

    /// Per-cluster convergence slots followed by the trailing count.
    pub fn convergence(&self) -> Vec<u32> {
        self.convergence.to_vec()
    }

    pub fn count(&self) -> u32 {
        self.centroids.len()
    }

    /// Starts a new clustering iteration: every convergence slot, the
    /// trailing one included, goes back to zero.
    pub fn begin_iteration(&mut self) {
        self.convergence.reset();
    }

    /// The trailing convergence slot.
    pub fn converged_count(&self) -> u32 {
        self.convergence.converged_count()
    }

    /// True once a completed round found every centroid converged.
    pub fn is_converged(&self) -> bool {
        self.convergence.round_complete()
    }

    /// Runs one dispatch of the kernel for `cluster`.
    pub fn dispatch(
        &mut self,
        pixels: &PixelGrid,
        assignment: &[u32],
        cluster: u32,
        params: &RunParams,
        schedule: &Schedule,
    ) -> Result<DispatchReport, DispatchError> {
        if let Err(err) = self.check_shapes(pixels, assignment, cluster, params) {
            tracing::warn!(%err, "dispatch rejected");
            return Err(err);
        }

        let groups = group_count(pixels.len(), params.workgroup_size, params.sequencing_factor);
        if self.store.groups() < groups {
            self.store = GroupStore::new(groups);
        }
        self.epoch = next_epoch(self.epoch);

        let span = tracing::debug_span!("dispatch", cluster, epoch = self.epoch, groups);
        let _enter = span.enter();

        let cx = DispatchContext {
            pixels,
            assignment,
            centroids: &self.centroids,
            convergence: &self.convergence,
            store: &self.store,
            params,
            cluster,
            epoch: self.epoch,
            groups,
        };
        let report = dispatch::run(&cx, schedule)?;
        if report.exited_early() {
            tracing::debug!("round already converged, nothing to do");
        }
        Ok(report)
    }

    fn check_shapes(
        &self,
        pixels: &PixelGrid,
        assignment: &[u32],
        cluster: u32,
        params: &RunParams,
    ) -> Result<(), DispatchError> {
        params.validate()?;
        if assignment.len() != pixels.len() {
            return Err(DispatchError::AssignmentLength {
                assignment: assignment.len(),
                pixels: pixels.len(),
            });
        }
        let count = self.count();
        if cluster >= count {
            return Err(DispatchError::ClusterOutOfRange { cluster, count });
        }
        Ok(())
    }

    /// Dispatches once per cluster, in increasing index order, so that the
    /// last dispatch closes the round.
    pub fn run_round(
        &mut self,
        pixels: &PixelGrid,
        assignment: &[u32],
        params: &RunParams,
        schedule: &Schedule,
    ) -> Result<Vec<DispatchReport>, DispatchError> {
        (0..self.count())
            .map(|cluster| self.dispatch(pixels, assignment, cluster, params, schedule))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_shapes_the_host_must_guarantee() {
        assert!(matches!(KMeansState::new(&[]), Err(DispatchError::NoCentroids)));

        let mut state = KMeansState::new(&[Vec4::ZERO; 2]).unwrap();
        let pixels = PixelGrid::solid(2, 2, Vec4::ONE);
        let params = RunParams::default();
        assert!(matches!(
            state.dispatch(&pixels, &[0; 3], 0, &params, &Schedule::Threaded),
            Err(DispatchError::AssignmentLength {
                assignment: 3,
                pixels: 4
            })
        ));
        assert!(matches!(
            state.dispatch(&pixels, &[0; 4], 2, &params, &Schedule::Threaded),
            Err(DispatchError::ClusterOutOfRange { cluster: 2, count: 2 })
        ));
    }

    #[test]
    fn scratch_grows_with_the_image() {
        let mut state = KMeansState::new(&[Vec4::ZERO]).unwrap();
        let params = RunParams {
            sequencing_factor: 1,
            workgroup_size: 2,
            ..RunParams::default()
        };
        let small = PixelGrid::solid(2, 1, Vec4::ONE);
        let large = PixelGrid::solid(8, 1, Vec4::ONE);

        let report = state
            .dispatch(&small, &[0; 2], 0, &params, &Schedule::Threaded)
            .unwrap();
        assert_eq!(report.groups, 1);

        state.begin_iteration();
        let report = state
            .dispatch(&large, &[0; 8], 0, &params, &Schedule::reversed(4))
            .unwrap();
        assert_eq!(report.groups, 4);
        assert_eq!(report.total, Some(Vec4::splat(8.0)));
    }
}
