use crate::image::PixelGrid;
use glam::Vec4;

/// Contribution of one worker: the sum of `(r, g, b, 1)` over the pixels in
/// `[worker * sequencing_factor, (worker + 1) * sequencing_factor)` that are
/// assigned to `cluster`.
///
/// Indices past the end of the image come from over-provisioned workers and
/// contribute nothing, as do pixels of other clusters and pixels with no
/// entry in `assignment`.
pub fn masked_accumulate(
    pixels: &PixelGrid,
    assignment: &[u32],
    cluster: u32,
    worker: u32,
    sequencing_factor: u32,
) -> Vec4 {
    let start = worker as usize * sequencing_factor as usize;
    let mut sum = Vec4::ZERO;
    for index in start..start + sequencing_factor as usize {
        let Some(color) = pixels.get(index) else {
            break;
        };
        if assignment.get(index) == Some(&cluster) {
            sum += color.truncate().extend(1.0);
        }
    }
    sum
}
