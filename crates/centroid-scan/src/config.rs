use crate::error::DispatchError;
use crate::layout::WORKGROUP_SIZE;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Largest group the CPU model accepts, the common device limit on
/// invocations per workgroup.
pub const MAX_WORKGROUP_SIZE: u32 = 1024;

/// What finalization records for a cluster that has no pixels assigned.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyClusterPolicy {
    /// The centroid cannot move, so it counts as converged.
    #[default]
    Converged,
    /// An empty cluster never counts as converged.
    NotConverged,
    /// Leave the convergence slot as the previous round wrote it.
    Unchanged,
}

impl EmptyClusterPolicy {
    /// Encoding used by the GPU kernel's parameter block.
    pub fn code(self) -> u32 {
        match self {
            Self::Converged => 0,
            Self::NotConverged => 1,
            Self::Unchanged => 2,
        }
    }
}

/// Parameters supplied by the host for one clustering iteration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParams {
    /// Pixels scanned by each worker.
    pub sequencing_factor: u32,
    /// Distance below which a centroid counts as converged.
    pub epsilon: f32,
    /// Workers per group. The CPU model accepts any power of two up to
    /// [`MAX_WORKGROUP_SIZE`], the GPU kernel is compiled for
    /// [`WORKGROUP_SIZE`].
    pub workgroup_size: u32,
    pub empty_cluster: EmptyClusterPolicy,
    /// Consecutive blocked look-back reads tolerated by the threaded CPU
    /// model before the dispatch is declared livelocked. Must be non-zero.
    pub spin_limit: u64,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            sequencing_factor: 24,
            epsilon: 1.0e-3,
            workgroup_size: WORKGROUP_SIZE,
            empty_cluster: EmptyClusterPolicy::default(),
            spin_limit: 1 << 28,
        }
    }
}

impl RunParams {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DispatchError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| DispatchError::ReadParams {
            path: path.to_owned(),
            source,
        })?;
        let params: Self = serde_json::from_str(&content)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.sequencing_factor == 0 {
            return Err(DispatchError::ZeroSequencingFactor);
        }
        if !self.workgroup_size.is_power_of_two() || self.workgroup_size > MAX_WORKGROUP_SIZE {
            return Err(DispatchError::WorkgroupSize(self.workgroup_size));
        }
        if self.epsilon.is_nan() || self.epsilon < 0.0 {
            return Err(DispatchError::Epsilon(self.epsilon));
        }
        if self.spin_limit == 0 {
            return Err(DispatchError::ZeroSpinLimit);
        }
        Ok(())
    }
}
