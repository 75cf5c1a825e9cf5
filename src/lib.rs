#![doc = "Grid-polygon conversion: digitize keyed polygons onto a regular grid and spread per-polygon values and time statistics over its cells"]
pub mod cache;
pub mod conv;
mod error;
pub mod grid;
pub mod io;
pub mod raster;
pub mod series;
pub mod timestats;
pub mod vector;

#[doc(inline)]
pub use error::{Error, Result};

#[doc(inline)]
pub use grid::Grid;

#[doc(inline)]
pub use raster::Affine;

#[doc(inline)]
pub use conv::{DigitizeOptions, GridPolyConv, IndexRaster, MaskedArray};

#[doc(inline)]
pub use cache::{CacheDirs, CacheLevel, Fingerprint};

#[doc(inline)]
pub use vector::{AttrValue, PolyKey, PolygonSource};

#[doc(inline)]
pub use series::CatchmentSeries;

#[doc(inline)]
pub use timestats::TimeStats;
