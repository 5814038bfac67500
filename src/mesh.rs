//! Mesh selection policy and low-resolution grid assembly.
//!
//! A mesh is dropped from the low-resolution map when too many of its
//! pixels are masked. The selection runs twice: once on the raw combined
//! mask and again after sigma clipping, which can fully mask a mesh that
//! survived the first pass.

use ndarray::Array2;

use crate::error::BkgError;

/// Decide which meshes enter the low-resolution map.
///
/// A mesh is included iff its masked-pixel count is at most
/// `exclude_percentile / 100 * box_npixels` and the mesh is not completely
/// masked. The second condition is what keeps an all-masked mesh out even
/// at `exclude_percentile = 100`.
///
/// Returns the ascending indices of the included meshes, or
/// [`BkgError::AllMeshesExcluded`] when none survive.
pub fn select_meshes(
    nmasked: &[usize],
    box_npixels: usize,
    exclude_percentile: f64,
) -> Result<Vec<usize>, BkgError> {
    let threshold_npixels = exclude_percentile / 100.0 * box_npixels as f64;
    let idx: Vec<usize> = nmasked
        .iter()
        .enumerate()
        .filter(|&(_, &n)| n as f64 <= threshold_npixels && n != box_npixels)
        .map(|(i, _)| i)
        .collect();

    if idx.is_empty() {
        return Err(BkgError::AllMeshesExcluded {
            threshold_npixels,
            exclude_percentile,
        });
    }
    Ok(idx)
}

/// A low-resolution grid paired with an explicit exclusion mask
/// (`true` = no value for that mesh). Used for the diagnostic, pre-gap-fill
/// views of the mesh maps.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedGrid<T> {
    /// Per-mesh values; entries at masked positions are `T::default()`.
    pub values: Array2<T>,
    /// `true` where the mesh was excluded and carries no value.
    pub mask: Array2<bool>,
}

impl<T> MaskedGrid<T> {
    /// Whether any mesh is missing a value.
    pub fn any_masked(&self) -> bool {
        self.mask.iter().any(|&m| m)
    }
}

/// Scatter per-mesh values into a 2D grid at their raster positions.
/// Positions not listed in `mesh_idx` stay masked.
///
/// `values` and `mesh_idx` must be aligned element for element.
pub fn scatter_to_grid<T: Copy + Default>(
    values: &[T],
    mesh_idx: &[usize],
    shape: (usize, usize),
) -> MaskedGrid<T> {
    debug_assert_eq!(values.len(), mesh_idx.len());
    let (_, nxboxes) = shape;
    let mut grid = Array2::from_elem(shape, T::default());
    let mut mask = Array2::from_elem(shape, true);
    for (&idx, &val) in mesh_idx.iter().zip(values.iter()) {
        let (by, bx) = (idx / nxboxes, idx % nxboxes);
        grid[[by, bx]] = val;
        mask[[by, bx]] = false;
    }
    MaskedGrid { values: grid, mask }
}
