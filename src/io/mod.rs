//! File formats, organized by format rather than by domain.
//!
//! - `gpc` - versioned binary cache format for [`GridPolyConv`](crate::GridPolyConv)
//! - `csv` - long-format catchment series (requires the `csv` feature)
//! - `text` - whitespace-separated array output
//!
//! Polygon shapefiles are read in [`vector::shp`](crate::vector::shp).

pub mod csv;
pub(crate) mod gpc;
pub mod text;
