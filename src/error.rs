//! Error types for the background estimation pipeline.
//!
//! Every failure here is a deterministic input-validation failure: callers
//! fix the configuration or the masks and re-invoke. No partial results are
//! ever returned alongside an error.

use thiserror::Error;

/// Errors produced while configuring or running the background estimation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BkgError {
    /// A mask array does not match the image shape.
    #[error("{name} shape ({got_ny}, {got_nx}) does not match image shape ({ny}, {nx})")]
    ShapeMismatch {
        /// Which input was mis-shaped ("mask" or "coverage_mask").
        name: &'static str,
        /// Expected (image) rows.
        ny: usize,
        /// Expected (image) columns.
        nx: usize,
        /// Actual rows.
        got_ny: usize,
        /// Actual columns.
        got_nx: usize,
    },

    /// `exclude_percentile` lies outside the closed range [0, 100].
    #[error("exclude_percentile must be between 0 and 100 (inclusive), got {0}")]
    ExcludePercentileOutOfRange(f64),

    /// The selection policy rejected every mesh, on the first pass or after
    /// sigma clipping. The message reports the effective pixel threshold so
    /// the caller knows how much to loosen `exclude_percentile`.
    #[error(
        "all meshes contain > {threshold_npixels} masked pixels \
         ({exclude_percentile} percent per mesh); check the input masks or \
         increase exclude_percentile to include more meshes"
    )]
    AllMeshesExcluded {
        /// Effective per-mesh masked-pixel threshold.
        threshold_npixels: f64,
        /// The configured percentile.
        exclude_percentile: f64,
    },

    /// The input image has a zero-length axis.
    #[error("input image must be non-empty, got shape ({0}, {1})")]
    EmptyImage(usize, usize),
}
