//! Grid-polygon conversion.
//!
//! A [`GridPolyConv`] maps every grid cell to the polygon(s) covering it. It
//! is built once per grid and polygon set (see [`build`]), optionally cached
//! on disk, and then used to spread per-polygon values onto the grid.

pub mod build;
mod masked;
mod project;
mod series;

use ahash::AHashSet;
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, ArrayViewD, Axis, Zip};

use crate::{Error, Result, vector::PolyKey};

pub use build::DigitizeOptions;
pub use masked::MaskedArray;

/// Cell-to-polygon index raster.
///
/// Values are 0 where no polygon covers a cell, otherwise a 1-based position
/// into the conversion's polygon keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexRaster {
    /// One polygon per cell, shape `(nrow, ncol)`.
    Single(Array2<u32>),
    /// Refined digitization, shape `(nlev, nrow, ncol)`. Level 0 holds the
    /// dominant polygon of each cell; `count` holds the number of sub-cell
    /// samples each level's polygon won.
    Levels { index: Array3<u32>, count: Array3<u32> },
}

impl IndexRaster {
    /// `(nrow, ncol)`
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Single(idx) => idx.dim(),
            Self::Levels { index, .. } => {
                let (_, nrow, ncol) = index.dim();
                (nrow, ncol)
            }
        }
    }

    pub fn num_levels(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Levels { index, .. } => index.len_of(Axis(0)),
        }
    }

    /// Index array of one level; level 0 of a single raster is the raster itself.
    pub fn level(&self, lev: usize) -> ArrayView2<'_, u32> {
        match self {
            Self::Single(idx) => {
                assert_eq!(lev, 0, "single-level raster has no level {lev}");
                idx.view()
            }
            Self::Levels { index, .. } => index.index_axis(Axis(0), lev),
        }
    }

    pub fn count(&self) -> Option<ArrayView3<'_, u32>> {
        match self {
            Self::Single(_) => None,
            Self::Levels { count, .. } => Some(count.view()),
        }
    }

    /// Index values as a 2-D or 3-D view.
    pub fn view(&self) -> ArrayViewD<'_, u32> {
        match self {
            Self::Single(idx) => idx.view().into_dyn(),
            Self::Levels { index, .. } => index.view().into_dyn(),
        }
    }

    pub fn max_index(&self) -> u32 {
        self.view().iter().copied().max().unwrap_or(0)
    }
}

/// Immutable mapping between grid cells and a set of keyed polygons.
#[derive(Debug, Clone)]
pub struct GridPolyConv<K> {
    poly_idx: Vec<K>,
    raster: IndexRaster,
    weight: Option<Array3<f64>>,
    mask: Array2<bool>,
}

impl<K: PolyKey> GridPolyConv<K> {
    /// Assemble a conversion from its stored parts. Weights and the coverage
    /// mask are derived here and never stored.
    pub fn new(poly_idx: Vec<K>, raster: IndexRaster) -> Result<Self> {
        let mut seen = AHashSet::with_capacity(poly_idx.len());
        if !poly_idx.iter().all(|k| seen.insert(k)) {
            return Err(Error::data("poly_idx values are not unique"));
        }
        let max_index = raster.max_index();
        if max_index as usize > poly_idx.len() {
            return Err(Error::data(format!(
                "index raster refers to position {max_index}, but only {} polygon keys exist",
                poly_idx.len()
            )));
        }

        let weight = match &raster {
            IndexRaster::Single(_) => None,
            IndexRaster::Levels { index, count } => {
                if index.dim() != count.dim() {
                    return Err(Error::data(format!(
                        "count shape must match index; found {:?} and {:?}",
                        count.dim(),
                        index.dim()
                    )));
                }
                if index.len_of(Axis(0)) == 0 {
                    return Err(Error::data("index raster must have at least one level"));
                }
                Some(weights_from_count(count))
            }
        };
        let mask = raster.level(0).mapv(|i| i == 0);

        Ok(Self { poly_idx, raster, weight, mask })
    }

    /// Polygon keys; raster value `i` refers to `poly_idx()[i - 1]`.
    #[inline]
    pub fn poly_idx(&self) -> &[K] { &self.poly_idx }

    #[inline]
    pub fn raster(&self) -> &IndexRaster { &self.raster }

    /// Sub-cell sample counts, present when refined.
    pub fn ar_count(&self) -> Option<ArrayView3<'_, u32>> {
        self.raster.count()
    }

    /// Area fraction of each level's polygon per cell, present when refined.
    pub fn weight(&self) -> Option<ArrayView3<'_, f64>> {
        self.weight.as_ref().map(|w| w.view())
    }

    /// True where no polygon covers the cell.
    #[inline]
    pub fn mask(&self) -> ArrayView2<'_, bool> { self.mask.view() }

    /// `(nrow, ncol)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) { self.raster.shape() }

    /// Level index arrays paired with their weights, when refined.
    pub(crate) fn levels(&self) -> Option<(&Array3<u32>, &Array3<f64>)> {
        match (&self.raster, self.weight.as_ref()) {
            (IndexRaster::Levels { index, .. }, Some(weight)) => Some((index, weight)),
            _ => None,
        }
    }

    /// Grid area of each polygon in cell units: summed weights when refined,
    /// otherwise the number of cells it owns. Aligned with `poly_idx()`.
    pub fn weight_mass(&self) -> Array1<f64> {
        let mut mass = Array1::<f64>::zeros(self.poly_idx.len());
        match self.levels() {
            Some((index, weight)) => {
                Zip::from(index).and(weight).for_each(|&i, &w| {
                    if i > 0 {
                        mass[i as usize - 1] += w;
                    }
                });
            }
            None => {
                for &i in self.raster.level(0).iter() {
                    if i > 0 {
                        mass[i as usize - 1] += 1.0;
                    }
                }
            }
        }
        mass
    }
}

impl<K: PartialEq> PartialEq for GridPolyConv<K> {
    /// Content equality over the stored parts.
    fn eq(&self, other: &Self) -> bool {
        self.poly_idx == other.poly_idx && self.raster == other.raster
    }
}

/// `count / count.sum(levels)`, 0 wherever a cell has no samples.
fn weights_from_count(count: &Array3<u32>) -> Array3<f64> {
    let total = count.map_axis(Axis(0), |c| c.iter().map(|&v| v as f64).sum::<f64>());
    let mut weight = count.mapv(|c| c as f64);
    for mut lev in weight.outer_iter_mut() {
        Zip::from(&mut lev).and(&total).for_each(|w, &t| {
            *w = if t != 0.0 { *w / t } else { 0.0 };
        });
    }
    weight
}
