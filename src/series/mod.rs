//! In-memory catchment series: values per polygon key, optionally along a
//! time axis and one extra "member" dimension (e.g. ensemble members).

use ahash::{AHashMap, AHashSet};
use chrono::NaiveDate;
use ndarray::{Array1, Array2, Array3, ArrayView3, Axis};

use crate::{Error, Result, vector::PolyKey};

/// Values stored as `(member, time, index)`. A series without a member
/// dimension has one member; one without a time axis has one time step.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchmentSeries<K> {
    index: Vec<K>,
    time: Option<Vec<NaiveDate>>,
    member_dim: Option<String>,
    values: Array3<f64>,
}

impl<K: PolyKey> CatchmentSeries<K> {
    /// One value per key.
    pub fn constant(index: Vec<K>, values: Array1<f64>) -> Result<Self> {
        let n = values.len();
        let values = values.into_shape((1, 1, n)).map_err(anyhow::Error::from)?;
        Self::build(index, None, None, values)
    }

    /// Values shaped `(time, index)`.
    pub fn time_series(index: Vec<K>, time: Vec<NaiveDate>, values: Array2<f64>) -> Result<Self> {
        Self::build(index, Some(time), None, values.insert_axis(Axis(0)))
    }

    /// Values shaped `(member, time, index)`; without `time` the middle axis
    /// must have length 1.
    pub fn with_members(
        index: Vec<K>,
        time: Option<Vec<NaiveDate>>,
        member_dim: impl Into<String>,
        values: Array3<f64>,
    ) -> Result<Self> {
        Self::build(index, time, Some(member_dim.into()), values)
    }

    fn build(index: Vec<K>, time: Option<Vec<NaiveDate>>, member_dim: Option<String>, values: Array3<f64>) -> Result<Self> {
        let (nmem, ntime, nidx) = values.dim();
        if nidx != index.len() {
            return Err(Error::data(format!(
                "series values have {nidx} columns, but the index has {} keys",
                index.len()
            )));
        }
        let expected_time = time.as_ref().map_or(1, Vec::len);
        if ntime != expected_time {
            return Err(Error::data(format!("series values have {ntime} time steps, expected {expected_time}")));
        }
        if nmem == 0 {
            return Err(Error::data("series has no members"));
        }
        let mut seen = AHashSet::with_capacity(index.len());
        if let Some(dup) = index.iter().find(|k| !seen.insert(*k)) {
            return Err(Error::data(format!("series index has duplicate key {dup:?}")));
        }
        Ok(Self { index, time, member_dim, values })
    }

    #[inline]
    pub fn index(&self) -> &[K] { &self.index }

    #[inline]
    pub fn time(&self) -> Option<&[NaiveDate]> { self.time.as_deref() }

    /// Name of the extra dimension, if any.
    #[inline]
    pub fn member_dim(&self) -> Option<&str> { self.member_dim.as_deref() }

    pub fn num_members(&self) -> usize { self.values.len_of(Axis(0)) }

    #[inline]
    pub fn values(&self) -> ArrayView3<'_, f64> { self.values.view() }

    /// Values of one member as `(time, keys)`, columns in the order of `keys`.
    ///
    /// `xidx` selects the member (0 with a warning when the series has a
    /// member dimension and none is given); it is ignored with a warning for
    /// series without one.
    pub fn select(&self, keys: &[K], xidx: Option<usize>) -> Result<Array2<f64>> {
        let member = match (self.member_dim(), xidx) {
            (Some(dim), None) => {
                tracing::warn!(
                    "series has extra dimension {dim:?} that should be indexed using xidx; choosing index 0 from size {}",
                    self.num_members()
                );
                0
            }
            (Some(dim), Some(i)) => {
                if i >= self.num_members() {
                    return Err(Error::data(format!(
                        "xidx {i} is out of range for {dim:?} with size {}",
                        self.num_members()
                    )));
                }
                tracing::info!("selecting xidx {i} from {dim:?} with size {}", self.num_members());
                i
            }
            (None, Some(i)) => {
                tracing::warn!("xidx {i} is ignored, no extra index found");
                0
            }
            (None, None) => 0,
        };

        let positions: AHashMap<&K, usize> = self.index.iter().enumerate().map(|(i, k)| (k, i)).collect();
        let missing: Vec<&K> = keys.iter().filter(|k| !positions.contains_key(k)).collect();
        if !missing.is_empty() {
            return Err(Error::data(format!(
                "{} polygon keys not found in series index: {:?}",
                missing.len(),
                &missing[..missing.len().min(10)]
            )));
        }
        let columns: Vec<usize> = keys.iter().map(|k| positions[k]).collect();
        tracing::debug!("loading data from {} catchments", columns.len());
        Ok(self.values.index_axis(Axis(0), member).select(Axis(1), &columns))
    }
}
