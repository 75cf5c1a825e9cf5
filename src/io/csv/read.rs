//! CSV reading operations.

use std::{fs::File, path::Path};

use ahash::AHashMap;
use anyhow::Context;
use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use polars::{frame::DataFrame, io::SerReader, prelude::{CsvReader, DataType}};

use crate::{Error, Result, series::CatchmentSeries, vector::AttrValue};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reads a CSV file from `path` into a Polars DataFrame.
fn read_csv(path: &Path) -> anyhow::Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[io::csv::read] Failed to open CSV file: {}", path.display()))?;
    CsvReader::new(file)
        .finish()
        .with_context(|| format!("[io::csv::read] Failed to read CSV from {:?}", path))
}

/// Read a long-format catchment series: one row per index (and time) value.
///
/// Integer index columns give [`AttrValue::Int`] keys, anything else
/// [`AttrValue::Text`]. Times are parsed as `%Y-%m-%d`; missing values
/// become NaN. Without `time_col` every index may appear once.
pub fn read_series_csv(
    path: &Path,
    index_col: &str,
    time_col: Option<&str>,
    value_col: &str,
) -> Result<CatchmentSeries<AttrValue>> {
    tracing::info!("reading series from CSV file {}", path.display());
    let df = read_csv(path)?;

    let available: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
    for name in [Some(index_col), time_col, Some(value_col)].into_iter().flatten() {
        if !available.iter().any(|a| a == name) {
            return Err(Error::data(format!("cannot find '{name}' in columns: {available:?}")));
        }
    }

    let keys = read_keys(&df, index_col)?;
    let values: Vec<f64> = df
        .column(value_col)
        .and_then(|c| c.cast(&DataType::Float64))
        .context("[io::csv::read] Value column is not numeric")?
        .f64()
        .context("[io::csv::read] Value column is not numeric")?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();
    let times = time_col.map(|name| read_times(&df, name)).transpose()?;

    let mut index: Vec<AttrValue> = Vec::new();
    let mut columns: AHashMap<AttrValue, usize> = AHashMap::new();
    for key in &keys {
        if !columns.contains_key(key) {
            columns.insert(key.clone(), index.len());
            index.push(key.clone());
        }
    }

    let Some(times) = times else {
        if index.len() != keys.len() {
            return Err(Error::data(format!("index column '{index_col}' has duplicate values and no time column was given")));
        }
        return CatchmentSeries::constant(index, Array1::from(values));
    };

    let mut time: Vec<NaiveDate> = times.clone();
    time.sort();
    time.dedup();
    let rows: AHashMap<NaiveDate, usize> = time.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    let mut ar = Array2::from_elem((time.len(), index.len()), f64::NAN);
    let mut seen = Array2::from_elem((time.len(), index.len()), false);
    for ((key, t), v) in keys.iter().zip(&times).zip(values) {
        let cell = (rows[t], columns[key]);
        if std::mem::replace(&mut seen[cell], true) {
            return Err(Error::data(format!("duplicate row for index {key} at {t}")));
        }
        ar[cell] = v;
    }
    tracing::info!("read {} catchments over {} time steps", index.len(), time.len());
    CatchmentSeries::time_series(index, time, ar)
}

fn read_keys(df: &DataFrame, name: &str) -> Result<Vec<AttrValue>> {
    let column = df.column(name).context("[io::csv::read] Missing index column")?;
    let keys = if column.dtype().is_integer() {
        column
            .cast(&DataType::Int64)
            .context("[io::csv::read] Failed to cast index column")?
            .i64()
            .context("[io::csv::read] Failed to read index column")?
            .into_iter()
            .map(|v| v.map(AttrValue::Int))
            .collect::<Option<Vec<_>>>()
    } else {
        column
            .cast(&DataType::String)
            .context("[io::csv::read] Failed to cast index column")?
            .str()
            .context("[io::csv::read] Failed to read index column")?
            .into_iter()
            .map(|v| v.map(|s| AttrValue::Text(s.trim().to_owned())))
            .collect::<Option<Vec<_>>>()
    };
    keys.ok_or_else(|| Error::data(format!("index column '{name}' has missing values")))
}

fn read_times(df: &DataFrame, name: &str) -> Result<Vec<NaiveDate>> {
    let column = df
        .column(name)
        .and_then(|c| c.cast(&DataType::String))
        .context("[io::csv::read] Failed to cast time column")?;
    column
        .str()
        .context("[io::csv::read] Failed to read time column")?
        .into_iter()
        .map(|v| {
            let v = v.ok_or_else(|| Error::data(format!("time column '{name}' has missing values")))?;
            NaiveDate::parse_from_str(v.trim(), DATE_FORMAT)
                .map_err(|e| Error::data(format!("cannot parse time {v:?} as {DATE_FORMAT}: {e}")))
        })
        .collect()
}
