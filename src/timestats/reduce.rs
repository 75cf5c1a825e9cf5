use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use crate::{Error, Result};

use super::{MonthWindow, Stat, TimeStats, nan_max, nan_mean, nan_median, nan_min, nan_quantile};

/// Mean values of one group year and its weighted total.
struct YearMean {
    year: i32,
    mean: Array1<f64>,
    total: f64,
}

/// Reduce `values` shaped `(time, poly)` along time, one result per
/// requested statistic, named by the statistic.
///
/// Only timestamps inside the window's months are used. With an explicit
/// window, `min`, `median` and `max` pick a whole year instead of reducing
/// each polygon separately: every group year is averaged, years are ranked
/// by `Σ mean(weight_mass × value)` over polygons, and the chosen year's
/// per-polygon means are returned. `mean` and `quantile(q)` are always
/// computed per polygon.
pub fn reduce_time(
    values: ArrayView2<'_, f64>,
    time: &[NaiveDate],
    stats: &TimeStats,
    weight_mass: ArrayView1<'_, f64>,
) -> Result<Vec<(String, Array1<f64>)>> {
    let (ntime, npoly) = values.dim();
    if ntime != time.len() {
        return Err(Error::data(format!("values have {ntime} time steps, but time has {}", time.len())));
    }
    if npoly != weight_mass.len() {
        return Err(Error::data(format!(
            "values have {npoly} polygons, but weight_mass has {}",
            weight_mass.len()
        )));
    }

    let window = stats.months();
    let selected: Vec<usize> = (0..ntime).filter(|&i| window.contains(time[i].month())).collect();
    if selected.is_empty() {
        return Err(Error::data(format!("no timestamps fall within the months of {stats}")));
    }
    if selected.len() == ntime {
        tracing::info!("performing statistics along full time dimension");
    } else {
        tracing::info!(
            "performing statistics with a {}-month window, using {} of {ntime} timestamps",
            window.num_months(),
            selected.len()
        );
    }
    let values = values.select(Axis(0), &selected);
    let times: Vec<NaiveDate> = selected.iter().map(|&i| time[i]).collect();

    let years = if stats.ranks_years() {
        year_means(values.view(), &times, &window, weight_mass)
    } else {
        Vec::new()
    };

    let mut out = Vec::with_capacity(stats.stats().len());
    for stat in stats.stats() {
        let result = match (stat, years.is_empty()) {
            (Stat::Mean, _) => values.map_axis(Axis(0), nan_mean),
            (Stat::Quantile(q), _) => values.map_axis(Axis(0), |col| nan_quantile(col, *q)),
            (Stat::Min, true) => values.map_axis(Axis(0), nan_min),
            (Stat::Max, true) => values.map_axis(Axis(0), nan_max),
            (Stat::Median, true) => values.map_axis(Axis(0), nan_median),
            (Stat::Min | Stat::Max | Stat::Median, false) => {
                let chosen = pick_year(&years, stat);
                tracing::info!("{stat} year is {}", window.year_label(chosen.year));
                chosen.mean.clone()
            }
        };
        out.push((stat.to_string(), result));
    }
    Ok(out)
}

/// Per-year means in ascending year order.
fn year_means(
    values: ArrayView2<'_, f64>,
    times: &[NaiveDate],
    window: &MonthWindow,
    weight_mass: ArrayView1<'_, f64>,
) -> Vec<YearMean> {
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, t) in times.iter().enumerate() {
        groups.entry(window.group_year(t.year(), t.month())).or_default().push(i);
    }
    tracing::debug!(
        "year counts: {:?}",
        groups.iter().map(|(y, rows)| (window.year_label(*y), rows.len())).collect::<Vec<_>>()
    );

    groups
        .into_iter()
        .map(|(year, rows)| {
            let mean = values.select(Axis(0), &rows).map_axis(Axis(0), nan_mean);
            let total = mean
                .iter()
                .zip(weight_mass.iter())
                .map(|(&v, &w)| w * v)
                .filter(|v| !v.is_nan())
                .sum();
            YearMean { year, mean, total }
        })
        .collect()
}

/// First year with the lowest/highest total, or the middle of the stable
/// ascending order for the median.
fn pick_year<'a>(years: &'a [YearMean], stat: &Stat) -> &'a YearMean {
    match stat {
        Stat::Min => years.iter().fold(&years[0], |best, y| if y.total < best.total { y } else { best }),
        Stat::Max => years.iter().fold(&years[0], |best, y| if y.total > best.total { y } else { best }),
        _ => {
            let mut order: Vec<&YearMean> = years.iter().collect();
            order.sort_by(|a, b| a.total.total_cmp(&b.total));
            order[order.len() / 2]
        }
    }
}
