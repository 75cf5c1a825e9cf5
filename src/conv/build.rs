//! Building conversions from polygons: CRS alignment, key enumeration,
//! (refined) rasterization and the cache round trip.

use std::fmt::Debug;
use std::path::Path;

use geo::{BoundingRect, Intersects, MultiPolygon, Rect, coord};
use ndarray::{Array2, Array3, Axis, Zip, stack};

use crate::cache::{self, CacheDirs, CacheLevel, Fingerprint};
use crate::grid::Grid;
use crate::raster::{Affine, IndexWidth, block_mode, block_sum, rasterize};
use crate::vector::{AttrValue, PolyKey, PolygonSource, proj};
use crate::{Error, Result};

use super::{GridPolyConv, IndexRaster};

/// Missing keys are listed in the coverage log below this count.
const MAX_LISTED_MISSING: usize = 20;

/// Share of the mean grid extent added around the grid when keeping
/// reprojected polygons.
const REPROJECT_BUFFER_FACTOR: f64 = 0.15;

/// Options for [`GridPolyConv::from_source`].
#[derive(Debug, Clone, PartialEq)]
pub struct DigitizeOptions {
    /// Sub-cell samples per cell side; 1 disables refinement.
    pub refine: u32,
    /// Maximum number of polygons kept per cell when refined.
    pub max_levels: u32,
    pub caching: CacheLevel,
    /// Cache directories; resolved from the environment when `None`.
    pub cache_dirs: Option<CacheDirs>,
}

impl Default for DigitizeOptions {
    fn default() -> Self {
        Self { refine: 5, max_levels: 5, caching: CacheLevel::Standard, cache_dirs: None }
    }
}

impl DigitizeOptions {
    pub fn validate(&self) -> Result<()> {
        if self.refine < 1 {
            return Err(Error::config(format!("refine must be >= 1; found {}", self.refine)));
        }
        if self.refine > 1 && self.max_levels < 1 {
            return Err(Error::config(format!("max_levels must be >= 1; found {}", self.max_levels)));
        }
        Ok(())
    }
}

impl<K: PolyKey> GridPolyConv<K> {
    /// Digitize polygons onto `grid` without touching the cache. Geometries
    /// must already be in the grid's reference system.
    pub fn from_polygons(
        grid: &Grid,
        features: Vec<(MultiPolygon<f64>, K)>,
        refine: u32,
        max_levels: u32,
    ) -> Result<Self> {
        DigitizeOptions { refine, max_levels, caching: CacheLevel::None, cache_dirs: None }.validate()?;
        if features.is_empty() {
            return Err(Error::NoFeatures);
        }
        let (poly_idx, shapes) = enumerate_keys(features);
        let raster = digitize(grid, &poly_idx, &shapes, refine, max_levels)?;
        Self::new(poly_idx, raster)
    }

    /// Digitize a polygon source onto `grid`, reprojecting and filtering its
    /// features, and reusing a cached conversion when one matches.
    pub fn from_source(grid: &Grid, source: &PolygonSource<K>, options: &DigitizeOptions) -> Result<Self> {
        options.validate()?;
        let dirs = match (options.caching, &options.cache_dirs) {
            (CacheLevel::None, _) => None,
            (_, Some(dirs)) => Some(dirs.clone()),
            (_, None) => Some(CacheDirs::from_env(source.path())?),
        };

        let features = align_features(grid, source)?;
        if features.is_empty() {
            return Err(Error::NoFeatures);
        }
        let (poly_idx, shapes) = enumerate_keys(features);

        let fingerprint = match options.caching {
            CacheLevel::None => None,
            CacheLevel::Standard => Some(Fingerprint::standard(grid, &poly_idx, options.refine)),
            CacheLevel::Strict => Some(Fingerprint::strict(grid, &poly_idx, options.refine, &shapes)),
        };
        if let (Some(dirs), Some(fp)) = (&dirs, &fingerprint) {
            if let Some(conv) = cache::lookup(dirs, fp, options.caching) {
                return Ok(conv);
            }
        }

        let raster = digitize(grid, &poly_idx, &shapes, options.refine, options.max_levels)?;
        let conv = Self::new(poly_idx, raster)?;

        if let (Some(dirs), Some(fp)) = (&dirs, &fingerprint) {
            cache::store(dirs, fp, &conv);
        }
        Ok(conv)
    }
}

impl GridPolyConv<AttrValue> {
    /// Read a polygon shapefile keyed by `attribute` and digitize it onto `grid`.
    pub fn from_grid_vector(grid: &Grid, path: &Path, attribute: &str, options: &DigitizeOptions) -> Result<Self> {
        options.validate()?;
        let source = crate::vector::shp::read_polygons(path, attribute)?;
        Self::from_source(grid, &source, options)
    }
}

/// Features of `source` in the grid's reference system that can touch the grid.
fn align_features<K: PolyKey>(grid: &Grid, source: &PolygonSource<K>) -> Result<Vec<(MultiPolygon<f64>, K)>> {
    let transform = match (grid.projection(), source.crs()) {
        (Some(dst), Some(src)) => match (resolve_crs(src, "polygon source"), resolve_crs(dst, "grid")) {
            (Some(src), Some(dst)) if !proj::is_same_crs(&src, &dst) => Some((src, dst)),
            (Some(_), Some(_)) => None,
            _ => {
                tracing::warn!("assuming the polygon source is in the grid projection");
                None
            }
        },
        (None, Some(_)) => {
            tracing::info!("grid has no projection; assuming the polygon source CRS");
            None
        }
        (Some(_), None) => {
            tracing::warn!("polygon source has no CRS; assuming the grid projection");
            None
        }
        (None, None) => None,
    };

    if let Some((src, dst)) = transform {
        tracing::info!("transforming {} polygons to grid projection", source.len());
        let (nrow, ncol) = grid.shape();
        let buffer = grid.resolution() * (nrow + ncol) as f64 / 2.0 * REPROJECT_BUFFER_FACTOR;
        let area = buffered(grid.rect(), buffer);
        let mut features = proj::transform_features(source.features(), &src, &dst)?;
        features.retain(|(geom, _)| geom.intersects(&area));
        tracing::info!("{} of {} polygons within buffered grid extent", features.len(), source.len());
        return Ok(features);
    }

    let extent = grid.rect();
    let features: Vec<_> = source
        .features()
        .iter()
        .filter(|(geom, _)| geom.bounding_rect().is_some_and(|b| b.intersects(&extent)))
        .cloned()
        .collect();
    if features.len() < source.len() {
        tracing::info!("{} of {} polygons overlap the grid extent", features.len(), source.len());
    }
    Ok(features)
}

/// PROJ string for `crs`, or `None` with a warning when it cannot be read.
fn resolve_crs(crs: &str, what: &str) -> Option<String> {
    match proj::to_proj_string(crs) {
        Ok(proj) => Some(proj),
        Err(err) => {
            tracing::warn!("cannot read {what} reference {crs:?}: {err}");
            None
        }
    }
}

fn buffered(rect: Rect<f64>, d: f64) -> Rect<f64> {
    let (min, max) = (rect.min(), rect.max());
    Rect::new(coord! { x: min.x - d, y: min.y - d }, coord! { x: max.x + d, y: max.y + d })
}

/// Sorted distinct keys, and each geometry paired with its key's 1-based
/// position. Geometries keep their input order.
fn enumerate_keys<K: PolyKey>(features: Vec<(MultiPolygon<f64>, K)>) -> (Vec<K>, Vec<(MultiPolygon<f64>, u32)>) {
    let mut keys: Vec<K> = features.iter().map(|(_, k)| k.clone()).collect();
    keys.sort();
    keys.dedup();

    let shapes = features
        .into_iter()
        .map(|(geom, key)| {
            let pos = keys.binary_search(&key).map_or(0, |i| i + 1);
            (geom, pos as u32)
        })
        .collect();
    (keys, shapes)
}

fn digitize<K: Debug>(
    grid: &Grid,
    keys: &[K],
    shapes: &[(MultiPolygon<f64>, u32)],
    refine: u32,
    max_levels: u32,
) -> Result<IndexRaster> {
    let width = IndexWidth::for_max(keys.len() as u32);
    tracing::info!("rasterizing {} polygons ({width} index) onto {grid}", keys.len());

    if refine <= 1 {
        let index = rasterize(shapes, grid.shape(), &grid.transform(), 0)?;
        log_coverage(keys, &index);
        return Ok(IndexRaster::Single(index));
    }

    let r = refine as usize;
    let (nrow, ncol) = grid.shape();
    let step = 1.0 / refine as f64;
    let fine_transform = grid.transform() * Affine::scale(step, step);
    tracing::info!("refining grid by {refine}x to shape {:?}", (nrow * r, ncol * r));
    let mut fine = rasterize(shapes, (nrow * r, ncol * r), &fine_transform, 0)?;
    log_coverage(keys, &fine);

    let mut index_levels: Vec<Array2<u32>> = Vec::new();
    let mut count_levels: Vec<Array2<u32>> = Vec::new();
    let mut remaining = true;
    for lev in 0..max_levels {
        let winner = block_mode(fine.view(), r);
        let selected = Array2::from_shape_fn(fine.dim(), |(i, j)| {
            let w = winner[[i / r, j / r]];
            w != 0 && fine[[i, j]] == w
        });
        let count = block_sum(selected.view(), r);
        Zip::from(&mut fine).and(&selected).for_each(|v, &sel| {
            if sel {
                *v = 0;
            }
        });
        index_levels.push(winner);
        count_levels.push(count);

        if fine.iter().all(|&v| v == 0) {
            tracing::debug!("no more polygons remain after level {lev}");
            remaining = false;
            break;
        }
    }
    if remaining {
        tracing::info!("reached max_levels={max_levels}; more levels could be requested to account for all polygons");
    }

    Ok(IndexRaster::Levels { index: stack_levels(&index_levels)?, count: stack_levels(&count_levels)? })
}

fn stack_levels(levels: &[Array2<u32>]) -> Result<Array3<u32>> {
    let views: Vec<_> = levels.iter().map(|l| l.view()).collect();
    Ok(stack(Axis(0), &views).map_err(anyhow::Error::from)?)
}

/// Log which keys made it into the burned raster.
fn log_coverage<K: Debug>(keys: &[K], burned: &Array2<u32>) {
    let mut seen = vec![false; keys.len() + 1];
    for &v in burned {
        if let Some(s) = seen.get_mut(v as usize) {
            *s = true;
        }
    }
    let missing: Vec<&K> = keys.iter().zip(&seen[1..]).filter(|(_, s)| !**s).map(|(k, _)| k).collect();

    if missing.is_empty() {
        tracing::info!("all {} polygons were rasterized", keys.len());
    } else if missing.len() == keys.len() {
        tracing::error!("none of the {} polygons were rasterized", keys.len());
    } else if missing.len() < MAX_LISTED_MISSING {
        tracing::info!(
            "{} of {} polygons were rasterized; missing: {missing:?}",
            keys.len() - missing.len(),
            keys.len()
        );
    } else {
        tracing::info!("{} of {} polygons were rasterized", keys.len() - missing.len(), keys.len());
    }
}
