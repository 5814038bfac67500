//! Mesh grid geometry: resizing the image to a whole number of boxes and
//! reshaping it into per-mesh pixel rows.
//!
//! The image is partitioned into a regular grid of `box_size` rectangles.
//! When the image dimensions are not exact multiples of the box size, the
//! image is either padded on the bottom/right edges (padded pixels are
//! masked) or cropped to the largest whole-box region.

use ndarray::{s, Array2, ArrayView2};

use crate::float_trait::BkgFloat;

/// Fill value written into padded pixels. The pad mask is authoritative;
/// the sentinel only keeps padded pixels recognizable if the mask is lost.
pub const PAD_SENTINEL: f64 = 1.0e10;

/// Size of one mesh cell, in pixels, as (height, width).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxSize {
    /// Cell height (rows).
    pub height: usize,
    /// Cell width (columns).
    pub width: usize,
}

impl BoxSize {
    /// Number of pixels in one mesh cell.
    pub fn npixels(&self) -> usize {
        self.height * self.width
    }

    /// Clamp the box so it never exceeds the image on either axis.
    pub fn clamped_to(self, shape: (usize, usize)) -> Self {
        Self {
            height: self.height.min(shape.0),
            width: self.width.min(shape.1),
        }
    }
}

impl From<usize> for BoxSize {
    /// A scalar produces a square box.
    fn from(size: usize) -> Self {
        Self {
            height: size,
            width: size,
        }
    }
}

impl From<(usize, usize)> for BoxSize {
    fn from((height, width): (usize, usize)) -> Self {
        Self { height, width }
    }
}

/// How to handle an image whose size is not a multiple of the box size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeMethod {
    /// Pad the image on the bottom/right edges up to the next whole box.
    /// Padded pixels are masked. This is the recommended method.
    #[default]
    Pad,
    /// Crop the image on the bottom/right edges down to a whole box count.
    Crop,
}

/// Image and mask resized to an exact multiple of the box size, together
/// with the resulting mesh grid dimensions.
#[derive(Debug, Clone)]
pub struct ResizedGrid<F> {
    /// Resized image data.
    pub data: Array2<F>,
    /// Resized exclusion mask; `true` pixels never enter any statistic.
    pub mask: Array2<bool>,
    /// Number of mesh rows.
    pub nyboxes: usize,
    /// Number of mesh columns.
    pub nxboxes: usize,
}

impl<F> ResizedGrid<F> {
    /// Total number of mesh cells.
    pub fn n_boxes(&self) -> usize {
        self.nyboxes * self.nxboxes
    }
}

/// Pad or crop the image (and mask) so both dimensions are exact multiples
/// of `box_size`, and report the mesh grid dimensions.
///
/// `mask` may be absent; the output mask is then all-`false` except for any
/// padded region.
pub fn resize_to_grid<F: BkgFloat>(
    data: ArrayView2<F>,
    mask: Option<&Array2<bool>>,
    box_size: BoxSize,
    edge_method: EdgeMethod,
) -> ResizedGrid<F> {
    let (ny, nx) = data.dim();
    let yextra = ny % box_size.height;
    let xextra = nx % box_size.width;

    if yextra == 0 && xextra == 0 {
        let mask = match mask {
            Some(m) => m.clone(),
            None => Array2::from_elem((ny, nx), false),
        };
        return ResizedGrid {
            data: data.to_owned(),
            mask,
            nyboxes: ny / box_size.height,
            nxboxes: nx / box_size.width,
        };
    }

    match edge_method {
        EdgeMethod::Pad => pad_to_grid(data, mask, box_size, yextra, xextra),
        EdgeMethod::Crop => crop_to_grid(data, mask, box_size),
    }
}

/// Extend the image on the trailing edges up to the next whole box.
/// Padded pixels get the sentinel value and are masked.
fn pad_to_grid<F: BkgFloat>(
    data: ArrayView2<F>,
    mask: Option<&Array2<bool>>,
    box_size: BoxSize,
    yextra: usize,
    xextra: usize,
) -> ResizedGrid<F> {
    let (ny, nx) = data.dim();
    let ypad = if yextra > 0 { box_size.height - yextra } else { 0 };
    let xpad = if xextra > 0 { box_size.width - xextra } else { 0 };
    let (ny_new, nx_new) = (ny + ypad, nx + xpad);

    let mut padded = Array2::from_elem((ny_new, nx_new), F::from_f64_c(PAD_SENTINEL));
    padded.slice_mut(s![..ny, ..nx]).assign(&data);

    // Mask the padded band regardless of the sentinel value.
    let mut padded_mask = Array2::from_elem((ny_new, nx_new), true);
    match mask {
        Some(m) => padded_mask.slice_mut(s![..ny, ..nx]).assign(m),
        None => padded_mask.slice_mut(s![..ny, ..nx]).fill(false),
    }

    ResizedGrid {
        data: padded,
        mask: padded_mask,
        nyboxes: ny_new / box_size.height,
        nxboxes: nx_new / box_size.width,
    }
}

/// Truncate the image on the trailing edges to a whole number of boxes.
fn crop_to_grid<F: BkgFloat>(
    data: ArrayView2<F>,
    mask: Option<&Array2<bool>>,
    box_size: BoxSize,
) -> ResizedGrid<F> {
    let (ny, nx) = data.dim();
    let nyboxes = ny / box_size.height;
    let nxboxes = nx / box_size.width;
    let (ny_crop, nx_crop) = (nyboxes * box_size.height, nxboxes * box_size.width);

    let cropped = data.slice(s![..ny_crop, ..nx_crop]).to_owned();
    let cropped_mask = match mask {
        Some(m) => m.slice(s![..ny_crop, ..nx_crop]).to_owned(),
        None => Array2::from_elem((ny_crop, nx_crop), false),
    };

    ResizedGrid {
        data: cropped,
        mask: cropped_mask,
        nyboxes,
        nxboxes,
    }
}

/// Flattened per-mesh pixel table: one row of `npix` pixels per mesh cell,
/// in raster mesh order, with a parallel boolean mask.
///
/// This is a pure reindexing of the resized image; it is discarded once the
/// per-mesh statistics have been computed.
#[derive(Debug, Clone)]
pub struct MeshTable<F> {
    values: Vec<F>,
    mask: Vec<bool>,
    n_meshes: usize,
    npix: usize,
}

impl<F: BkgFloat> MeshTable<F> {
    /// Number of mesh rows in the table.
    pub fn n_meshes(&self) -> usize {
        self.n_meshes
    }

    /// Pixels per mesh.
    pub fn npix(&self) -> usize {
        self.npix
    }

    /// Pixel values of mesh `i`.
    pub fn row(&self, i: usize) -> &[F] {
        &self.values[i * self.npix..(i + 1) * self.npix]
    }

    /// Mask of mesh `i` (`true` = excluded pixel).
    pub fn mask_row(&self, i: usize) -> &[bool] {
        &self.mask[i * self.npix..(i + 1) * self.npix]
    }

    /// Parallel iteration handles over the value and mask rows.
    pub fn rows_mut(&mut self) -> (&[F], &mut [bool], usize) {
        (&self.values, &mut self.mask, self.npix)
    }

    /// Keep only the listed mesh rows, in order.
    pub fn restrict(&self, keep: &[usize]) -> Self {
        let mut values = Vec::with_capacity(keep.len() * self.npix);
        let mut mask = Vec::with_capacity(keep.len() * self.npix);
        for &i in keep {
            values.extend_from_slice(self.row(i));
            mask.extend_from_slice(self.mask_row(i));
        }
        Self {
            values,
            mask,
            n_meshes: keep.len(),
            npix: self.npix,
        }
    }

    /// Unmasked pixel values of mesh `i`.
    pub fn unmasked_row(&self, i: usize) -> Vec<F> {
        self.row(i)
            .iter()
            .zip(self.mask_row(i).iter())
            .filter(|&(_, &m)| !m)
            .map(|(&v, _)| v)
            .collect()
    }

    /// Number of masked pixels in each mesh row.
    pub fn masked_counts(&self) -> Vec<usize> {
        (0..self.n_meshes)
            .map(|i| self.mask_row(i).iter().filter(|&&m| m).count())
            .collect()
    }
}

/// Reshape the resized image into one row per mesh cell (raster mesh
/// order, row-major pixels within each cell). Bijective with the resized
/// geometry: every pixel lands in exactly one row.
pub fn partition_meshes<F: BkgFloat>(grid: &ResizedGrid<F>, box_size: BoxSize) -> MeshTable<F> {
    let npix = box_size.npixels();
    let n_meshes = grid.n_boxes();
    let mut values = Vec::with_capacity(n_meshes * npix);
    let mut mask = Vec::with_capacity(n_meshes * npix);

    for by in 0..grid.nyboxes {
        let y0 = by * box_size.height;
        for bx in 0..grid.nxboxes {
            let x0 = bx * box_size.width;
            for dy in 0..box_size.height {
                for dx in 0..box_size.width {
                    values.push(grid.data[[y0 + dy, x0 + dx]]);
                    mask.push(grid.mask[[y0 + dy, x0 + dx]]);
                }
            }
        }
    }

    MeshTable {
        values,
        mask,
        n_meshes,
        npix,
    }
}

/// Mesh grid geometry needed to evaluate the full-resolution surface:
/// the box size, the grid dimensions and the output image shape.
#[derive(Debug, Clone, Copy)]
pub struct MeshGeometry {
    /// Size of one mesh cell.
    pub box_size: BoxSize,
    /// Number of mesh rows.
    pub nyboxes: usize,
    /// Number of mesh columns.
    pub nxboxes: usize,
    /// Shape of the full-resolution output (the original image shape).
    pub out_shape: (usize, usize),
}

impl MeshGeometry {
    /// Mesh-center y coordinates in pixel space (pixel-center convention).
    pub fn y_centers(&self) -> Vec<f64> {
        let b = self.box_size.height;
        (0..self.nyboxes)
            .map(|i| (i * b) as f64 + (b as f64 - 1.0) / 2.0)
            .collect()
    }

    /// Mesh-center x coordinates in pixel space (pixel-center convention).
    pub fn x_centers(&self) -> Vec<f64> {
        let b = self.box_size.width;
        (0..self.nxboxes)
            .map(|i| (i * b) as f64 + (b as f64 - 1.0) / 2.0)
            .collect()
    }
}
