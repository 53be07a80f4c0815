//! Common types shared across the raster-core crates.
//!
//! Everything that flows between the tile cache, the resampler and the
//! geometric-correction consumers lives here: integer and floating point
//! geometry, the pixel scalar types, the [`ImageData`] tile buffer, the
//! [`TileProvider`] contract and the `key: value` persistence format.

pub mod endian;
pub mod error;
pub mod geometry;
pub mod keywords;
pub mod provider;
pub mod scalar;
pub mod tile;

pub use endian::{swap_raw, Endian, EndianSwap};
pub use error::{RasterError, Result};
pub use geometry::{DPoint, IntPoint, IntRect};
pub use keywords::{KeywordList, StatePersistence};
pub use provider::{BandSelector, TileProvider};
pub use scalar::{Sample, ScalarType};
pub use tile::{DataObjectStatus, ImageData, SampleBuffer};
