use std::path::PathBuf;
use thiserror::Error;

/// Reasons a host-side dispatch of the CPU model is refused or aborted.
///
/// The kernel itself has no recoverable errors; everything here is either a
/// shape the host was supposed to guarantee or a protocol hazard.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("assignment has {assignment} entries but the image has {pixels} pixels")]
    AssignmentLength { assignment: usize, pixels: usize },
    #[error("cluster {cluster} is out of range for {count} centroids")]
    ClusterOutOfRange { cluster: u32, count: u32 },
    #[error("the centroid table is empty")]
    NoCentroids,
    #[error("`sequencing_factor` must be at least 1")]
    ZeroSequencingFactor,
    #[error("`workgroup_size` must be a power of two no larger than 1024, found {0}")]
    WorkgroupSize(u32),
    #[error("`epsilon` must be a non-negative number, found {0}")]
    Epsilon(f32),
    #[error("`spin_limit` must be at least 1")]
    ZeroSpinLimit,
    #[error("pixel buffer holds {actual} samples, expected {expected} for the given dimensions")]
    PixelCount { expected: usize, actual: usize },
    #[error("schedule must order each of the {groups} groups exactly once")]
    InvalidSchedule { groups: u32 },
    #[error("group {group} panicked during the dispatch")]
    GroupPanicked { group: u32 },
    #[error("group {group} gave up waiting on group {waiting_on} (look-back livelock)")]
    Livelock { group: u32, waiting_on: u32 },
    #[error("reading run parameters from '{path}'")]
    ReadParams {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing run parameters")]
    ParseParams(#[from] serde_json::Error),
}
