//! Shared test utilities for the raster-core workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Tile and grid data generators with predictable values
//! - A mock tile provider that counts upstream fetches
//! - Common rectangles and tile sizes
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{create_ramp_tile, MockTileProvider};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
