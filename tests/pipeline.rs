use geo::{MultiPolygon, polygon};
use gridconv::{
    CacheDirs, CacheLevel, CatchmentSeries, DigitizeOptions, Error, Fingerprint, Grid, GridPolyConv, IndexRaster,
    PolygonSource, TimeStats,
};
use ndarray::{arr1, arr2};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]])
}

fn quadrant_source() -> PolygonSource<i64> {
    PolygonSource::new(vec![(rect(0.0, 20.0, 20.0, 40.0), 10), (rect(20.0, 0.0, 40.0, 20.0), 20)])
}

fn grid() -> Grid {
    Grid::new(10.0, (4, 4), (0.0, 40.0), None).unwrap()
}

#[test]
fn quadrants_round_trip_through_values() {
    let options = DigitizeOptions { refine: 1, caching: CacheLevel::None, ..Default::default() };
    let conv = GridPolyConv::from_source(&grid(), &quadrant_source(), &options).unwrap();
    assert_eq!(
        conv.raster(),
        &IndexRaster::Single(arr2(&[[1, 1, 0, 0], [1, 1, 0, 0], [0, 0, 2, 2], [0, 0, 2, 2]]))
    );

    let ar = conv.array_from_values(&[10, 20], arr1(&[100.0, 200.0]).view().into_dyn(), 0.0, false).unwrap();
    assert_eq!(
        ar.filled(-1.0),
        arr2(&[
            [100.0, 100.0, -1.0, -1.0],
            [100.0, 100.0, -1.0, -1.0],
            [-1.0, -1.0, 200.0, 200.0],
            [-1.0, -1.0, 200.0, 200.0],
        ])
        .into_dyn()
    );
    assert_eq!(ar.mask(), conv.mask());
}

#[test]
fn refined_quadrants_match_unrefined_values() {
    let options = DigitizeOptions { refine: 4, caching: CacheLevel::None, ..Default::default() };
    let conv = GridPolyConv::from_source(&grid(), &quadrant_source(), &options).unwrap();
    assert_eq!(conv.raster().num_levels(), 1);
    let ar = conv.array_from_values(&[20, 10], arr1(&[2.0, 1.0]).view().into_dyn(), 0.0, true).unwrap();
    assert_eq!(ar.get(&[0, 0]), Some(1.0));
    assert_eq!(ar.get(&[3, 3]), Some(2.0));
    assert_eq!(ar.get(&[0, 3]), None);
}

#[test]
fn standard_lookup_accepts_strict_cache_by_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let strict = DigitizeOptions {
        refine: 2,
        caching: CacheLevel::Strict,
        cache_dirs: Some(CacheDirs::new(dir.path())),
        ..Default::default()
    };
    let built = GridPolyConv::from_source(&grid(), &quadrant_source(), &strict).unwrap();

    let files: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].len(), "c".len() + 16 + ".gpc".len());

    let standard = Fingerprint::standard(&grid(), &[10i64, 20], 2);
    assert_eq!(files[0][..9], standard.prefix());
    assert_eq!(gridconv::cache::lookup::<i64>(&CacheDirs::new(dir.path()), &standard, CacheLevel::Standard), Some(built.clone()));

    // a geometry edit keeps the prefix but misses under strict matching
    let moved = PolygonSource::new(vec![(rect(0.0, 20.0, 20.0, 40.0), 10), (rect(20.0, 0.0, 40.0, 10.0), 20)]);
    let rebuilt = GridPolyConv::from_source(&grid(), &moved, &strict).unwrap();
    assert_ne!(rebuilt, built);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn no_features_in_grid_extent() {
    let source = PolygonSource::new(vec![(rect(500.0, 500.0, 600.0, 600.0), 1i64)]);
    let options = DigitizeOptions { caching: CacheLevel::None, ..Default::default() };
    assert!(matches!(GridPolyConv::from_source(&grid(), &source, &options), Err(Error::NoFeatures)));
}

#[test]
fn water_year_statistics_on_the_grid() {
    let options = DigitizeOptions { refine: 1, caching: CacheLevel::None, ..Default::default() };
    let conv = GridPolyConv::from_source(&grid(), &quadrant_source(), &options).unwrap();

    // Jul 2000 to Jun 2002: the first water year is wetter on average, but
    // the single driest month falls into it
    let time: Vec<_> = (0..24)
        .map(|i| chrono::NaiveDate::from_ymd_opt(2000 + (6 + i) / 12, ((6 + i) % 12) as u32 + 1, 1).unwrap())
        .collect();
    let values = ndarray::Array2::from_shape_fn((24, 2), |(t, _)| match t {
        3 => -10.0,
        0..12 => 8.0,
        _ => 4.0,
    });
    let series = CatchmentSeries::time_series(vec![10i64, 20], time, values).unwrap();
    let stats: TimeStats = "Jul-Jun:min".parse().unwrap();

    let out = conv.array_from_series(&series, Some(&stats), None, 0.0, true).unwrap();
    let min = &out[&Some("min".to_string())];
    assert_eq!(min.get(&[0, 0]), Some(4.0));
    assert_eq!(min.get(&[3, 3]), Some(4.0));
}

#[cfg(feature = "csv")]
#[test]
fn csv_series_through_conversion() {
    use std::io::Write;

    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(b"rid,time,flow\n10,2001-01-01,1.0\n20,2001-01-01,3.0\n10,2001-02-01,2.0\n20,2001-02-01,5.0\n")
        .unwrap();
    let series = gridconv::io::csv::read_series_csv(file.path(), "rid", Some("time"), "flow").unwrap();

    let options = DigitizeOptions { refine: 1, caching: CacheLevel::None, ..Default::default() };
    let source = PolygonSource::new(
        quadrant_source().features().iter().map(|(g, k)| (g.clone(), gridconv::AttrValue::Int(*k))).collect(),
    );
    let conv = GridPolyConv::from_source(&grid(), &source, &options).unwrap();
    let stats: TimeStats = "max,mean".parse().unwrap();
    let out = conv.array_from_series(&series, Some(&stats), None, 0.0, true).unwrap();
    assert_eq!(out[&Some("max".to_string())].get(&[3, 3]), Some(5.0));
    assert_eq!(out[&Some("mean".to_string())].get(&[0, 0]), Some(1.5));
}
