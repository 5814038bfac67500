//! Shepard inverse-distance-weighted gap filling for the low-resolution
//! mesh grids.
//!
//! When the selection policy drops meshes, the low-resolution grid has
//! holes that the surface interpolator cannot tolerate. Each missing mesh
//! value is reconstructed as a weighted average of the `n_neighbors`
//! nearest included meshes, weighted by inverse distance.

use ndarray::Array2;

use crate::float_trait::BkgFloat;

/// Parameters of the inverse-distance-weighted mesh interpolation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdwParams {
    /// Maximum number of nearest included meshes averaged per target.
    pub n_neighbors: usize,
    /// Power of the inverse distance used for the weights.
    pub power: f64,
    /// Regularization added to the denominator; controls smoothness and
    /// guards the weight against tiny distances.
    pub reg: f64,
    /// Accepted approximation tolerance for the neighbor search. The
    /// search implemented here is exact, so the value has no effect; it
    /// only bounds what an approximate search would be allowed to return.
    pub eps: f64,
}

impl Default for IdwParams {
    fn default() -> Self {
        Self {
            n_neighbors: 10,
            power: 1.0,
            reg: 0.0,
            eps: 0.0,
        }
    }
}

/// Interpolate one target coordinate from the known mesh coordinates.
///
/// Exact coordinate matches short-circuit to the known value, for any
/// `power`/`reg`.
fn idw_at<F: BkgFloat>(
    target: (f64, f64),
    known: &[(f64, f64)],
    values: &[F],
    params: &IdwParams,
) -> F {
    // (distance, index), stably sorted so ties keep natural order
    let mut dists: Vec<(f64, usize)> = known
        .iter()
        .enumerate()
        .map(|(i, &(ky, kx))| {
            let (dy, dx) = (target.0 - ky, target.1 - kx);
            ((dy * dy + dx * dx).sqrt(), i)
        })
        .collect();
    dists.sort_by(|a, b| a.0.total_cmp(&b.0));

    let k = params.n_neighbors.min(dists.len());
    if k > 0 && dists[0].0 == 0.0 {
        return values[dists[0].1];
    }

    let mut wsum = 0.0;
    let mut vsum = 0.0;
    for &(d, i) in dists.iter().take(k) {
        let w = 1.0 / (d.powf(params.power) + params.reg);
        wsum += w;
        vsum += w * values[i].as_f64();
    }
    F::from_f64_c(vsum / wsum)
}

/// Build a complete low-resolution grid from the included meshes' values.
///
/// Included positions keep their values exactly (distance-zero
/// short-circuit); every excluded position is filled by IDW over its
/// nearest included neighbors.
pub fn idw_fill_grid<F: BkgFloat>(
    values: &[F],
    mesh_idx: &[usize],
    shape: (usize, usize),
    params: &IdwParams,
) -> Array2<F> {
    let (_, nxboxes) = shape;
    let known: Vec<(f64, f64)> = mesh_idx
        .iter()
        .map(|&i| ((i / nxboxes) as f64, (i % nxboxes) as f64))
        .collect();

    Array2::from_shape_fn(shape, |(by, bx)| {
        idw_at((by as f64, bx as f64), &known, values, params)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_short_circuit() {
        // even with aggressive reg/power, a known coordinate returns its
        // own value untouched
        let params = IdwParams {
            power: 3.0,
            reg: 0.7,
            ..IdwParams::default()
        };
        let grid = idw_fill_grid(&[5.0f64, 9.0, 1.0], &[0, 1, 3], (2, 2), &params);
        assert_eq!(grid[[0, 0]], 5.0);
        assert_eq!(grid[[0, 1]], 9.0);
        assert_eq!(grid[[1, 1]], 1.0);
    }

    #[test]
    fn test_filled_value_is_weighted_average() {
        // missing mesh (1, 0): neighbors at distance 1, 1 and sqrt(2)
        let grid = idw_fill_grid(
            &[2.0f64, 4.0, 6.0],
            &[0, 1, 3],
            (2, 2),
            &IdwParams::default(),
        );
        let w_near = 1.0;
        let w_far = 1.0 / 2f64.sqrt();
        let expected = (2.0 * w_near + 6.0 * w_near + 4.0 * w_far) / (2.0 * w_near + w_far);
        assert!((grid[[1, 0]] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_neighbor_cap_limits_support() {
        // with n_neighbors = 1, the missing corner copies its single
        // nearest neighbor
        let params = IdwParams {
            n_neighbors: 1,
            ..IdwParams::default()
        };
        let grid = idw_fill_grid(&[3.0f64, 8.0], &[0, 3], (2, 3), &params);
        // (0, 1) is at distance 1 from (0, 0) and sqrt(2) from (1, 0)
        assert_eq!(grid[[0, 1]], 3.0);
        // (1, 1) is at distance 1 from (1, 0) and sqrt(2) from (0, 0)
        assert_eq!(grid[[1, 1]], 8.0);
    }

    #[test]
    fn test_constant_values_fill_constant() {
        let grid = idw_fill_grid(&[7.0f32, 7.0], &[0, 5], (2, 3), &IdwParams::default());
        for &v in grid.iter() {
            assert!((v - 7.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_reg_pulls_fill_toward_plain_average() {
        // huge reg makes all weights nearly equal
        let params = IdwParams {
            reg: 1e9,
            ..IdwParams::default()
        };
        let grid = idw_fill_grid(&[0.0f64, 10.0], &[0, 2], (1, 4), &params);
        assert!((grid[[0, 3]] - 5.0).abs() < 1e-6);
    }
}
