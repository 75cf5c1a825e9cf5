//! CSV input for catchment series.

#[cfg(feature = "csv")]
mod read;

#[cfg(feature = "csv")]
pub use read::read_series_csv;

#[cfg(not(feature = "csv"))]
pub fn read_series_csv(
    _path: &std::path::Path,
    _index_col: &str,
    _time_col: Option<&str>,
    _value_col: &str,
) -> crate::Result<crate::series::CatchmentSeries<crate::vector::AttrValue>> {
    Err(crate::Error::MissingCapability("reading CSV series requires the `csv` feature"))
}
