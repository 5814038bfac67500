//! Combination of the bad-pixel and no-coverage masks.
//!
//! The two input masks serve different purposes: the bad-pixel mask marks
//! pixels with invalid data (sources, saturation, defects) while the
//! coverage mask marks pixels with no data at all (blank mosaic regions).
//! Both are excluded from mesh statistics; only the coverage mask is later
//! re-applied to the output surfaces via the fill value.

use ndarray::{Array2, ArrayView2};

use crate::error::BkgError;

/// Validate that an optional mask matches the image shape.
fn check_shape(
    name: &'static str,
    mask: Option<ArrayView2<bool>>,
    shape: (usize, usize),
) -> Result<(), BkgError> {
    if let Some(m) = mask {
        if m.dim() != shape {
            let (got_ny, got_nx) = m.dim();
            return Err(BkgError::ShapeMismatch {
                name,
                ny: shape.0,
                nx: shape.1,
                got_ny,
                got_nx,
            });
        }
    }
    Ok(())
}

/// Merge the bad-pixel mask and the coverage mask into a single exclusion
/// mask (logical OR). Returns `None` when neither mask was supplied.
///
/// Both masks must match `shape` exactly; a mismatch fails before any grid
/// work is done.
pub fn combine_masks(
    mask: Option<ArrayView2<bool>>,
    coverage_mask: Option<ArrayView2<bool>>,
    shape: (usize, usize),
) -> Result<Option<Array2<bool>>, BkgError> {
    check_shape("mask", mask, shape)?;
    check_shape("coverage_mask", coverage_mask, shape)?;

    let combined = match (mask, coverage_mask) {
        (None, None) => None,
        (Some(m), None) => Some(m.to_owned()),
        (None, Some(c)) => Some(c.to_owned()),
        (Some(m), Some(c)) => {
            let mut out = m.to_owned();
            out.zip_mut_with(&c, |a, &b| *a |= b);
            Some(out)
        }
    };
    Ok(combined)
}
