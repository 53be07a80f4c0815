//! Double-precision interpolation grids.
//!
//! A [`DblGrid`] stores a dense, row-major grid of `f64` nodes placed in a
//! continuous U/V frame by an origin and per-axis spacing. Point queries
//! interpolate bilinearly between the four surrounding nodes, optionally
//! extrapolate past the grid edge, and finally fold the result into the
//! grid's [`DomainType`] so angular quantities stay in range.
//!
//! Grids are typically populated sparsely from measurements with
//! [`DblGrid::set_nearest_node`], completed with
//! [`DblGrid::interpolate_null_valued_nodes`], smoothed with
//! [`DblGrid::filter`] and then queried many times.

pub mod domain;
pub mod grid;

pub use domain::DomainType;
pub use grid::{DblGrid, GridStats};
