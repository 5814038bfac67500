//! Mesh-based 2D background estimation.
//!
//! Estimates a smooth, low-frequency background level and background RMS
//! underlying a 2D image contaminated by sources, bad pixels and
//! missing-coverage regions. The image is partitioned into a regular grid
//! of boxes ("meshes"); each mesh contributes a sigma-clipped robust
//! statistic to a low-resolution map, which is gap-filled, median-smoothed
//! and interpolated back to full resolution.

pub mod background;
pub mod error;
pub mod filter;
pub mod float_trait;
pub mod grid;
pub mod idw;
pub mod interp;
pub mod mask;
pub mod mesh;
pub mod stats;

// Re-export commonly used types at the crate root
pub use background::{Background2D, BackgroundConfig};
pub use error::BkgError;
pub use float_trait::BkgFloat;
pub use grid::{BoxSize, EdgeMethod};
pub use idw::IdwParams;
pub use interp::{MeshInterpolator, SplineMeshInterpolator};
pub use mesh::MaskedGrid;
pub use stats::{
    ClipCenter, ClippedStd, LevelEstimator, MadStd, MedianLevel, SExtractorMode, ScatterEstimator,
    SigmaClip,
};
