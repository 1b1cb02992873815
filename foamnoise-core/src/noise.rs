use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Build one perturbed velocity vector per cell.
///
/// The streamwise (x) component is fixed to `u_bulk`; y and z receive
/// amplitude-scaled standard-normal noise, each component re-centered to
/// exactly zero mean. The same seed and cell count always reproduce the
/// same vectors.
pub fn perturbed_velocities(count: usize, amp: f64, u_bulk: f64, seed: u64) -> Vec<[f64; 3]> {
    let mut rng = StdRng::seed_from_u64(seed);
    let uy = zero_mean_normal(&mut rng, count);
    let uz = zero_mean_normal(&mut rng, count);

    uy.iter()
        .zip(&uz)
        .map(|(&y, &z)| [u_bulk, amp * y, amp * z])
        .collect()
}

/// Draw `count` standard-normal deviates and subtract their sample mean.
fn zero_mean_normal(rng: &mut StdRng, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }

    let mut samples: Vec<f64> = (0..count).map(|_| rng.sample(StandardNormal)).collect();
    let mean = samples.iter().sum::<f64>() / count as f64;
    for s in &mut samples {
        *s -= mean;
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_reproduces_identical_noise() {
        let a = perturbed_velocities(256, 0.1, 1.0, 7);
        let b = perturbed_velocities(256, 0.1, 1.0, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let a = perturbed_velocities(64, 0.1, 1.0, 7);
        let b = perturbed_velocities(64, 0.1, 1.0, 8);
        assert_ne!(a, b);
    }

    #[test]
    fn noise_components_are_zero_mean() {
        let vectors = perturbed_velocities(1000, 0.05, 1.0, 42);
        let mean_y: f64 = vectors.iter().map(|v| v[1]).sum::<f64>() / vectors.len() as f64;
        let mean_z: f64 = vectors.iter().map(|v| v[2]).sum::<f64>() / vectors.len() as f64;
        assert!(mean_y.abs() < 1e-12);
        assert!(mean_z.abs() < 1e-12);
    }

    #[test]
    fn streamwise_component_is_bulk_constant() {
        let vectors = perturbed_velocities(100, 0.1, 2.5, 7);
        assert!(vectors.iter().all(|v| v[0] == 2.5));
    }

    #[test]
    fn amplitude_scales_noise() {
        let small = perturbed_velocities(128, 0.1, 1.0, 7);
        let large = perturbed_velocities(128, 0.2, 1.0, 7);
        for (a, b) in small.iter().zip(&large) {
            assert!((b[1] - 2.0 * a[1]).abs() < 1e-15);
            assert!((b[2] - 2.0 * a[2]).abs() < 1e-15);
        }
    }

    #[test]
    fn length_matches_cell_count() {
        assert_eq!(perturbed_velocities(37, 0.1, 1.0, 7).len(), 37);
    }

    #[test]
    fn zero_cells_yields_empty_field() {
        assert!(perturbed_velocities(0, 0.1, 1.0, 7).is_empty());
    }
}
