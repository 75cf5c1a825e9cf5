use std::fmt;
use std::path::Path;

use geo::{Rect, coord};

use crate::{Error, Result, raster::Affine};

/// A north-up regular grid: square cells of `resolution`, `shape` as
/// `(nrow, ncol)`, anchored at the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    resolution: f64,
    shape: (usize, usize),
    top_left: (f64, f64),
    projection: Option<String>,
}

impl Grid {
    pub fn new(
        resolution: f64,
        shape: (usize, usize),
        top_left: (f64, f64),
        projection: Option<String>,
    ) -> Result<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(Error::config(format!("resolution must be positive; found {resolution}")));
        }
        if shape.0 == 0 || shape.1 == 0 {
            return Err(Error::config(format!("grid shape must be non-empty; found {shape:?}")));
        }
        let projection = projection.filter(|p| !p.trim().is_empty());
        Ok(Self { resolution, shape, top_left, projection })
    }

    /// Grid covering a bounding box, expanded by `buffer` and snapped
    /// outward to multiples of `resolution`.
    pub fn from_bbox(
        (xmin, ymin, xmax, ymax): (f64, f64, f64, f64),
        resolution: f64,
        buffer: f64,
        projection: Option<String>,
    ) -> Result<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(Error::config(format!("resolution must be positive; found {resolution}")));
        }
        if !(xmin <= xmax && ymin <= ymax) {
            return Err(Error::data(format!(
                "invalid bounding box ({xmin}, {ymin}, {xmax}, {ymax})"
            )));
        }
        let snap_down = |v: f64| (v / resolution).floor() * resolution;
        let snap_up = |v: f64| (v / resolution).ceil() * resolution;

        let xmin = snap_down(xmin - buffer);
        let ymin = snap_down(ymin - buffer);
        let xmax = snap_up(xmax + buffer);
        let ymax = snap_up(ymax + buffer);

        let nrow = (((ymax - ymin) / resolution).round() as usize).max(1);
        let ncol = (((xmax - xmin) / resolution).round() as usize).max(1);
        Self::new(resolution, (nrow, ncol), (xmin, ymax), projection)
    }

    /// Grid covering the extent of the polygons in a shapefile.
    pub fn from_vector(
        path: &Path,
        resolution: f64,
        buffer: f64,
        projection: Option<String>,
    ) -> Result<Self> {
        let bounds = crate::vector::shp::read_bounds(path)?;
        tracing::info!("creating grid from vector extent {:?}: {}", bounds, path.display());
        Self::from_bbox(bounds, resolution, buffer, projection)
    }

    #[inline]
    pub fn resolution(&self) -> f64 { self.resolution }

    /// `(nrow, ncol)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) { self.shape }

    #[inline]
    pub fn top_left(&self) -> (f64, f64) { self.top_left }

    /// Projection descriptor (PROJ string), if known.
    #[inline]
    pub fn projection(&self) -> Option<&str> { self.projection.as_deref() }

    pub fn transform(&self) -> Affine {
        let (x0, y0) = self.top_left;
        Affine::new(self.resolution, 0.0, x0, 0.0, -self.resolution, y0)
    }

    /// `(xmin, ymin, xmax, ymax)`
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (nrow, ncol) = self.shape;
        let (x0, y0) = self.top_left;
        (
            x0,
            y0 - nrow as f64 * self.resolution,
            x0 + ncol as f64 * self.resolution,
            y0,
        )
    }

    pub fn rect(&self) -> Rect<f64> {
        let (xmin, ymin, xmax, ymax) = self.bounds();
        Rect::new(coord! { x: xmin, y: ymin }, coord! { x: xmax, y: ymax })
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Grid: resolution={:?}, shape={:?}, top_left={:?} />",
            self.resolution, self.shape, self.top_left
        )
    }
}
