use bytemuck::{Pod, Zeroable};
use centroid_scan::RunParams;

/// Uniform block of `centroid_update.wgsl`, rewritten before every dispatch.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct KernelParams {
    pub cluster: u32,
    pub count: u32,
    pub sequencing_factor: u32,
    pub epoch: u32,
    pub epsilon: f32,
    pub empty_policy: u32,
    pub pixel_count: u32,
    pub _padding: u32,
}

impl KernelParams {
    pub fn new(run: &RunParams, cluster: u32, count: u32, epoch: u32, pixel_count: u32) -> Self {
        Self {
            cluster,
            count,
            sequencing_factor: run.sequencing_factor,
            epoch,
            epsilon: run.epsilon,
            empty_policy: run.empty_cluster.code(),
            pixel_count,
            _padding: 0,
        }
    }
}
