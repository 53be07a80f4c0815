//! Tile resampling.
//!
//! A [`Resampler`] fills an output [`ImageData`] from an input tile using
//! one of the [`ResamplerType`] kernels. Two calling conventions are
//! supported:
//!
//! - [`Resampler::resample`]: uniform decimation by the output-to-input
//!   ratio set with [`Resampler::set_ratio`].
//! - [`Resampler::resample_quad`]: an arbitrary quadrilateral scan of the
//!   input described by a [`QuadScan`], for rotated or sheared views.
//!
//! Bilinear and bicubic kernels read their weights from a [`WeightTable`]
//! indexed by the quantized fractional sample offset. Tables are rebuilt
//! lazily, only when the kernel, the cubic parameter or the required table
//! resolution changes.
//!
//! [`ImageData`]: raster_common::ImageData

mod kernel;
pub mod resampler;
pub mod types;
pub mod weights;

pub use resampler::{QuadScan, Resampler};
pub use types::ResamplerType;
pub use weights::{cubic_weight, WeightTable, DEFAULT_CUBIC_PARAMETER, TABLE_RESOLUTION};
