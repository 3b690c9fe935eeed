use glam::Vec4;

/// Hillis-Steele inclusive scan over one group's shared memory.
///
/// Lanes are emulated in lockstep: for each step every lane first reads its
/// addend (lanes below `stride` read nothing), then, after the barrier, every
/// lane adds it. No lane observes a value written in the same step, which is
/// what the two barriers per step guarantee on the GPU.
///
/// `shared.len()` must be a power of two. Afterwards lane `i` holds the sum of
/// lanes `0..=i`, so the last lane holds the group's local aggregate.
pub fn inclusive_scan(shared: &mut [Vec4]) {
    debug_assert!(shared.len().is_power_of_two());
    let mut addends = vec![Vec4::ZERO; shared.len()];
    let mut stride = 1;
    while stride < shared.len() {
        // barrier
        for (lane, addend) in addends.iter_mut().enumerate() {
            *addend = if lane >= stride {
                shared[lane - stride]
            } else {
                Vec4::ZERO
            };
        }
        // barrier
        for (value, addend) in shared.iter_mut().zip(&addends) {
            *value += *addend;
        }
        stride <<= 1;
    }
}
