//! Full clustering runs driven the way a host drives the kernel: assign,
//! begin the iteration, one round of dispatches, check the trailing slot.

use centroid_scan::reference::reference_round;
use centroid_scan::{KMeansState, PixelGrid, RunParams, Schedule};
use glam::Vec4;
use rand::prelude::*;
use rand::rngs::StdRng;

/// Nearest centroid by RGB distance, the collaborator that produces the
/// assignment array.
fn assign(pixels: &PixelGrid, centroids: &[Vec4]) -> Vec<u32> {
    pixels
        .colors()
        .iter()
        .map(|color| {
            (0..)
                .zip(centroids)
                .map(|(cluster, centroid)| {
                    (cluster, centroid.truncate().distance_squared(color.truncate()))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map_or(0, |(cluster, _)| cluster)
        })
        .collect()
}

/// Two noisy color blobs.
fn two_blobs(rng: &mut StdRng) -> PixelGrid {
    let (warm, cool) = (Vec4::new(0.9, 0.3, 0.1, 1.0), Vec4::new(0.1, 0.4, 0.8, 1.0));
    let colors = (0..64 * 48)
        .map(|i| {
            let base = if i % 3 == 0 { cool } else { warm };
            let noise = Vec4::new(
                rng.gen_range(-0.05..0.05),
                rng.gen_range(-0.05..0.05),
                rng.gen_range(-0.05..0.05),
                0.0,
            );
            base + noise
        })
        .collect();
    PixelGrid::from_colors(64, 48, colors).unwrap()
}

#[test]
fn clustering_converges_to_the_blobs() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut rng = StdRng::seed_from_u64(7);
    let pixels = two_blobs(&mut rng);
    let params = RunParams {
        sequencing_factor: 4,
        workgroup_size: 64,
        epsilon: 1.0e-4,
        ..RunParams::default()
    };
    let mut state = KMeansState::new(&[
        Vec4::new(0.5, 0.5, 0.5, 1.0),
        Vec4::new(0.0, 0.0, 1.0, 1.0),
    ])
    .unwrap();

    let mut iterations = 0;
    while !state.is_converged() {
        iterations += 1;
        assert!(iterations <= 20, "no convergence after 20 iterations");
        let assignment = assign(&pixels, &state.centroids());
        state.begin_iteration();
        state
            .run_round(&pixels, &assignment, &params, &Schedule::Threaded)
            .unwrap();
    }

    let centroids = state.centroids();
    assert!(centroids[0].abs_diff_eq(Vec4::new(0.9, 0.3, 0.1, 1.0), 0.02));
    assert!(centroids[1].abs_diff_eq(Vec4::new(0.1, 0.4, 0.8, 1.0), 0.02));
    assert_eq!(state.convergence(), vec![1, 1, 2]);
}

#[test]
fn rounds_track_the_reference() {
    let mut rng = StdRng::seed_from_u64(42);
    let pixels = two_blobs(&mut rng);
    let params = RunParams {
        sequencing_factor: 3,
        workgroup_size: 32,
        ..RunParams::default()
    };
    let initial = [
        Vec4::new(0.2, 0.2, 0.2, 1.0),
        Vec4::new(0.8, 0.8, 0.8, 1.0),
        Vec4::new(0.0, 0.0, 1.0, 1.0),
    ];
    let mut state = KMeansState::new(&initial).unwrap();
    let mut expected = initial.to_vec();

    for _ in 0..4 {
        let assignment = assign(&pixels, &expected);
        let previous = state.convergence();
        let (next, converged) =
            reference_round(&pixels, &assignment, &expected, &previous, &params);
        expected = next;

        state.begin_iteration();
        state
            .run_round(&pixels, &assignment, &params, &Schedule::Threaded)
            .unwrap();
        for (actual, reference) in state.centroids().iter().zip(&expected) {
            assert!(actual.abs_diff_eq(*reference, 1.0e-4), "{actual} vs {reference}");
        }
        assert_eq!(state.converged_count(), converged);
        // keep both sides on the exact same centroids
        expected = state.centroids();
    }
}
