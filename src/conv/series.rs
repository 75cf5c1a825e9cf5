use std::collections::BTreeMap;

use ndarray::Axis;

use crate::series::CatchmentSeries;
use crate::timestats::{TimeStats, reduce_time};
use crate::{Result, vector::PolyKey};

use super::{GridPolyConv, MaskedArray};

impl<K: PolyKey> GridPolyConv<K> {
    /// Project a catchment series onto the grid.
    ///
    /// With `time_stats` and a time axis, one array per statistic is returned
    /// under the statistic's name. Otherwise the values are projected as they
    /// are under `None`: a 2-D array, or 3-D `(time, nrow, ncol)` for a
    /// series with a time axis.
    pub fn array_from_series(
        &self,
        series: &CatchmentSeries<K>,
        time_stats: Option<&TimeStats>,
        xidx: Option<usize>,
        fill: f64,
        enforce1d: bool,
    ) -> Result<BTreeMap<Option<String>, MaskedArray>> {
        let values = series.select(self.poly_idx(), xidx)?;
        let mut out = BTreeMap::new();

        match (time_stats, series.time()) {
            (Some(stats), Some(time)) => {
                tracing::info!("determining time stats {stats} along time dimension");
                let mass = self.weight_mass();
                for (name, row) in reduce_time(values.view(), time, stats, mass.view())? {
                    let ar = self.array_from_values(self.poly_idx(), row.view().into_dyn(), fill, enforce1d)?;
                    out.insert(Some(name), ar);
                }
            }
            (_, time) => {
                tracing::debug!("time stats are not used");
                let ar = if time.is_some() {
                    self.array_from_values(self.poly_idx(), values.view().into_dyn(), fill, enforce1d)?
                } else {
                    let row = values.index_axis(Axis(0), 0);
                    self.array_from_values(self.poly_idx(), row.into_dyn(), fill, enforce1d)?
                };
                out.insert(None, ar);
            }
        }
        Ok(out)
    }
}
