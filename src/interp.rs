//! Expansion of the low-resolution mesh grid to the full image resolution.
//!
//! The default interpolator runs a separable Catmull-Rom cubic spline
//! keyed to the mesh-center pixel coordinates: a horizontal pass expands
//! each mesh row to the full output width, then a vertical pass blends the
//! expanded rows at every output row. Coordinates beyond the outermost
//! mesh centers are clamped, so the surface continues flat past the last
//! center. A single-mesh grid degenerates to a constant image with no
//! special casing.

use std::fmt::Debug;

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::float_trait::BkgFloat;
use crate::grid::MeshGeometry;

/// Expands a complete low-resolution mesh grid to full resolution.
pub trait MeshInterpolator<F: BkgFloat>: Debug + Send + Sync {
    /// Evaluate the surface at every pixel of `geom.out_shape`.
    ///
    /// `mesh` has shape `(geom.nyboxes, geom.nxboxes)` and contains no
    /// missing values (gap filling has already run).
    fn expand(&self, mesh: ArrayView2<F>, geom: &MeshGeometry) -> Array2<F>;
}

/// Catmull-Rom spline weights for one target coordinate.
///
/// Returns the four (clamped) knot indices and their blend weights. The
/// weights always sum to 1, so constant knot values reproduce exactly.
fn segment_weights(knots: &[f64], target: f64, cursor: &mut usize) -> ([usize; 4], [f64; 4]) {
    let len = knots.len();
    let tx = target.clamp(knots[0], knots[len - 1]);

    // knots are sorted and targets ascend, so a forward scan suffices
    while *cursor < len.saturating_sub(2) && knots[*cursor + 1] <= tx {
        *cursor += 1;
    }
    let i = *cursor;

    let idx = [
        i.saturating_sub(1),
        i,
        (i + 1).min(len - 1),
        (i + 2).min(len - 1),
    ];

    let x1 = knots[idx[1]];
    let x2 = knots[idx[2]];
    let dist = x2 - x1;
    if dist.abs() < 1e-9 {
        return (idx, [0.0, 1.0, 0.0, 0.0]);
    }

    let t = (tx - x1) / dist;
    let t2 = t * t;
    let t3 = t2 * t;
    let w = [
        0.5 * (-t + 2.0 * t2 - t3),
        0.5 * (2.0 - 5.0 * t2 + 3.0 * t3),
        0.5 * (t + 4.0 * t2 - 3.0 * t3),
        0.5 * (-t2 + t3),
    ];
    (idx, w)
}

/// Interpolate a 1D row of knot values at ascending target coordinates.
fn interpolate_row(knots_x: &[f64], values: &[f64], targets: &[f64], out: &mut [f64]) {
    if knots_x.len() == 1 {
        out.fill(values[0]);
        return;
    }
    let mut cursor = 0usize;
    for (dst, &tx) in out.iter_mut().zip(targets.iter()) {
        let (idx, w) = segment_weights(knots_x, tx, &mut cursor);
        *dst = w[0] * values[idx[0]]
            + w[1] * values[idx[1]]
            + w[2] * values[idx[2]]
            + w[3] * values[idx[3]];
    }
}

/// Separable Catmull-Rom spline surface interpolator (the default).
#[derive(Debug, Clone, Copy, Default)]
pub struct SplineMeshInterpolator;

impl<F: BkgFloat> MeshInterpolator<F> for SplineMeshInterpolator {
    fn expand(&self, mesh: ArrayView2<F>, geom: &MeshGeometry) -> Array2<F> {
        let (oh, ow) = geom.out_shape;
        let y_centers = geom.y_centers();
        let x_centers = geom.x_centers();
        let target_x: Vec<f64> = (0..ow).map(|x| x as f64).collect();

        // horizontal pass: each mesh row expanded to the output width
        let mut rows_full = vec![0.0f64; geom.nyboxes * ow];
        for (r, buf) in rows_full.chunks_mut(ow).enumerate() {
            let row: Vec<f64> = mesh.row(r).iter().map(|&v| v.as_f64()).collect();
            interpolate_row(&x_centers, &row, &target_x, buf);
        }

        // vertical pass: blend four expanded rows per output row
        let mut out = vec![F::zero(); oh * ow];
        out.par_chunks_mut(ow).enumerate().for_each(|(y, dst)| {
            let mut cursor = 0usize;
            let (idx, w) = segment_weights(&y_centers, y as f64, &mut cursor);
            let r0 = &rows_full[idx[0] * ow..(idx[0] + 1) * ow];
            let r1 = &rows_full[idx[1] * ow..(idx[1] + 1) * ow];
            let r2 = &rows_full[idx[2] * ow..(idx[2] + 1) * ow];
            let r3 = &rows_full[idx[3] * ow..(idx[3] + 1) * ow];
            for (c, d) in dst.iter_mut().enumerate() {
                *d = F::from_f64_c(w[0] * r0[c] + w[1] * r1[c] + w[2] * r2[c] + w[3] * r3[c]);
            }
        });

        Array2::from_shape_vec((oh, ow), out).expect("buffer length matches output shape")
    }
}
