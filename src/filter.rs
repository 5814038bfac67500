//! 2D median smoothing of the completed low-resolution mesh grids.
//!
//! The filter window is truncated at the grid borders: out-of-bounds
//! neighbors are simply absent, so border cells take the median of the
//! in-bounds part of their window. With a threshold, only cells whose
//! background value exceeds it are refiltered, and the identical cell set
//! is refiltered in the RMS grid to keep the two maps spatially
//! consistent.

use ndarray::Array2;

use crate::float_trait::BkgFloat;
use crate::stats::median_f64;

/// In-bounds window bounds for a filter of `size` centered on `(i, j)`.
fn window_bounds(
    (i, j): (usize, usize),
    size: (usize, usize),
    shape: (usize, usize),
) -> (usize, usize, usize, usize) {
    let (fh, fw) = size;
    let (hy, hx) = (fh / 2, fw / 2);
    let y0 = i.saturating_sub(hy);
    let y1 = (i + fh - hy).min(shape.0);
    let x0 = j.saturating_sub(hx);
    let x1 = (j + fw - hx).min(shape.1);
    (y0, y1, x0, x1)
}

/// Median of the in-bounds window of `grid` centered on `(i, j)`.
fn window_median<F: BkgFloat>(
    grid: &Array2<F>,
    center: (usize, usize),
    size: (usize, usize),
) -> F {
    let (y0, y1, x0, x1) = window_bounds(center, size, grid.dim());
    let mut vals: Vec<f64> = (y0..y1)
        .flat_map(|y| (x0..x1).map(move |x| (y, x)))
        .map(|(y, x)| grid[[y, x]].as_f64())
        .collect();
    F::from_f64_c(median_f64(&mut vals))
}

/// Median-filter the whole grid with a truncated window. A `(1, 1)` window
/// returns the grid unchanged.
pub fn median_filter_grid<F: BkgFloat>(grid: &Array2<F>, size: (usize, usize)) -> Array2<F> {
    if size == (1, 1) {
        return grid.clone();
    }
    Array2::from_shape_fn(grid.dim(), |pos| window_median(grid, pos, size))
}

/// Cells of the background grid whose value strictly exceeds `threshold`.
pub fn cells_above<F: BkgFloat>(grid: &Array2<F>, threshold: F) -> Vec<(usize, usize)> {
    grid.indexed_iter()
        .filter(|&(_, &v)| v > threshold)
        .map(|(pos, _)| pos)
        .collect()
}

/// Median-filter only the listed cells, reading every window from the
/// unfiltered input.
pub fn selective_median_filter<F: BkgFloat>(
    grid: &Array2<F>,
    size: (usize, usize),
    cells: &[(usize, usize)],
) -> Array2<F> {
    let mut out = grid.clone();
    for &pos in cells {
        out[pos] = window_median(grid, pos, size);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_unit_window_is_identity() {
        let grid = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(median_filter_grid(&grid, (1, 1)), grid);
    }

    #[test]
    fn test_interior_cell_full_window() {
        let grid = array![
            [1.0, 2.0, 3.0],
            [4.0, 100.0, 6.0],
            [7.0, 8.0, 9.0],
        ];
        let filtered = median_filter_grid(&grid, (3, 3));
        // median of {1..9 with 5 replaced by 100} = 6
        assert_eq!(filtered[[1, 1]], 6.0);
    }

    #[test]
    fn test_border_window_is_truncated() {
        let grid = array![
            [1.0, 2.0, 3.0],
            [4.0, 5.0, 6.0],
            [7.0, 8.0, 9.0],
        ];
        let filtered = median_filter_grid(&grid, (3, 3));
        // corner (0, 0) sees only {1, 2, 4, 5}: median 3.0 (middle average)
        assert_eq!(filtered[[0, 0]], 3.0);
        // edge (0, 1) sees {1, 2, 3, 4, 5, 6}: median 3.5
        assert_eq!(filtered[[0, 1]], 3.5);
    }

    #[test]
    fn test_rectangular_window() {
        let grid = array![
            [1.0, 2.0, 3.0],
            [4.0, 5.0, 6.0],
            [7.0, 8.0, 9.0],
        ];
        // 1x3 window smooths along rows only
        let filtered = median_filter_grid(&grid, (1, 3));
        assert_eq!(filtered[[1, 1]], 5.0);
        assert_eq!(filtered[[0, 0]], 1.5);
    }

    #[test]
    fn test_cells_above_is_strict() {
        let grid = array![[1.0, 2.0], [3.0, 2.0]];
        let cells = cells_above(&grid, 2.0);
        assert_eq!(cells, vec![(1, 0)]);
    }

    #[test]
    fn test_selective_filter_touches_only_listed_cells() {
        let grid = array![
            [1.0, 2.0, 3.0],
            [4.0, 100.0, 6.0],
            [7.0, 8.0, 9.0],
        ];
        let filtered = selective_median_filter(&grid, (3, 3), &[(1, 1)]);
        assert_eq!(filtered[[1, 1]], 6.0);
        // everything else is untouched, including the outlier's neighbors
        assert_eq!(filtered[[0, 0]], 1.0);
        assert_eq!(filtered[[2, 2]], 9.0);
    }

    #[test]
    fn test_selective_filter_reads_unfiltered_input() {
        // both listed cells must see the same (original) windows
        let grid = array![[10.0, 0.0], [0.0, 0.0]];
        let filtered = selective_median_filter(&grid, (3, 3), &[(0, 0), (0, 1)]);
        // each window covers the whole grid: {10, 0, 0, 0} -> median 0.0
        assert_eq!(filtered[[0, 0]], 0.0);
        assert_eq!(filtered[[0, 1]], 0.0);
    }
}
