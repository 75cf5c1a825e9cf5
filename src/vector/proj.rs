//! Coordinate reference comparison and polygon transformation.

use std::collections::BTreeSet;

use geo::MultiPolygon;

use crate::{Error, Result};

/// PROJ parameters that do not change the coordinate reference.
const IGNORED_PARAMS: &[&str] = &["no_defs", "type=crs", "wktext"];

/// Normalized `key=value` parameter set of a PROJ string.
fn proj_params(crs: &str) -> BTreeSet<String> {
    crs.split_whitespace()
        .map(|p| p.trim_start_matches('+').to_ascii_lowercase())
        .filter(|p| !p.is_empty() && !IGNORED_PARAMS.contains(&p.as_str()))
        .collect()
}

#[cfg_attr(not(feature = "proj"), allow(dead_code))]
fn is_latlong(crs: &str) -> bool {
    proj_params(crs)
        .iter()
        .any(|p| matches!(p.as_str(), "proj=longlat" | "proj=latlong" | "proj=lonlat" | "proj=latlon"))
}

/// True for WKT descriptors, e.g. the contents of a shapefile `.prj`.
pub fn is_wkt(crs: &str) -> bool {
    let crs = crs.trim_start();
    crs.find('[').is_some_and(|i| {
        i > 0 && crs[..i].trim_end().chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    })
}

/// PROJ string for a descriptor. WKT is converted; anything else is taken
/// to be a PROJ string already.
#[cfg(feature = "proj")]
pub fn to_proj_string(crs: &str) -> Result<String> {
    if !is_wkt(crs) {
        return Ok(crs.trim().to_owned());
    }
    proj4wkt::wkt_to_projstring(crs)
        .map(|s| s.trim().to_owned())
        .map_err(|e| Error::projection(format!("failed to convert WKT to PROJ.4: {e:?}")))
}

#[cfg(not(feature = "proj"))]
pub fn to_proj_string(crs: &str) -> Result<String> {
    if is_wkt(crs) {
        return Err(Error::MissingCapability("reading WKT references requires the `proj` feature"));
    }
    Ok(crs.trim().to_owned())
}

/// True when two descriptors name the same reference: identical text, or the
/// same PROJ parameters in any order.
pub fn is_same_crs(a: &str, b: &str) -> bool {
    if a.trim() == b.trim() {
        return true;
    }
    let (pa, pb) = (proj_params(a), proj_params(b));
    !pa.is_empty() && pa == pb
}

/// Transform every feature from `from` into `to` (PROJ strings, see
/// [`to_proj_string`]). Geographic references are in degrees on both sides.
#[cfg(feature = "proj")]
pub fn transform_features<K: Clone>(
    features: &[(MultiPolygon<f64>, K)],
    from: &str,
    to: &str,
) -> Result<Vec<(MultiPolygon<f64>, K)>> {
    use geo::{Coord, MapCoords};
    use proj4rs::{proj::Proj as Proj4, transform::transform};

    let src = Proj4::from_proj_string(from)
        .map_err(|e| Error::projection(format!("failed to build source PROJ.4 {from:?}: {e}")))?;
    let dst = Proj4::from_proj_string(to)
        .map_err(|e| Error::projection(format!("failed to build target PROJ.4 {to:?}: {e}")))?;
    let (src_geog, dst_geog) = (is_latlong(from), is_latlong(to));

    let (src, dst) = (&src, &dst);
    features
        .iter()
        .map(|(geom, key)| {
            let projected = geom.try_map_coords(|coord: Coord<f64>| {
                let mut point = if src_geog {
                    (coord.x.to_radians(), coord.y.to_radians(), 0.0)
                } else {
                    (coord.x, coord.y, 0.0)
                };
                transform(src, dst, &mut point)
                    .map_err(|e| Error::projection(format!("CRS transform failed: {e}")))?;
                Ok::<_, Error>(if dst_geog {
                    Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
                } else {
                    Coord { x: point.0, y: point.1 }
                })
            })?;
            Ok((projected, key.clone()))
        })
        .collect()
}

#[cfg(not(feature = "proj"))]
pub fn transform_features<K: Clone>(
    _features: &[(MultiPolygon<f64>, K)],
    _from: &str,
    _to: &str,
) -> Result<Vec<(MultiPolygon<f64>, K)>> {
    Err(Error::MissingCapability("transforming polygons requires the `proj` feature"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_crs_ignores_order_and_defaults() {
        assert!(is_same_crs(
            "+proj=utm +zone=59 +south +datum=WGS84 +units=m +no_defs",
            "+datum=WGS84 +proj=utm +south +zone=59 +units=m +type=crs",
        ));
        assert!(!is_same_crs("+proj=utm +zone=59 +south", "+proj=utm +zone=60 +south"));
        assert!(is_same_crs("EPSG:2193", " EPSG:2193 "));
        assert!(!is_same_crs("", "+proj=longlat"));
    }

    #[test]
    fn detects_geographic_references() {
        assert!(is_latlong("+proj=longlat +datum=WGS84 +no_defs"));
        assert!(!is_latlong("+proj=utm +zone=59 +south"));
    }

    const ESRI_WGS84: &str = "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",\
        SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],PRIMEM[\"Greenwich\",0.0],\
        UNIT[\"Degree\",0.0174532925199433]]";

    #[test]
    fn recognizes_wkt_descriptors() {
        assert!(is_wkt(ESRI_WGS84));
        assert!(is_wkt("  PROJCS[\"NZGD2000 / New Zealand Transverse Mercator 2000\",GEOGCS[]]"));
        assert!(!is_wkt("+proj=longlat +datum=WGS84"));
        assert!(!is_wkt("EPSG:2193"));
        assert!(!is_wkt("[]"));
        assert_eq!(to_proj_string(" +proj=utm +zone=59 ").unwrap(), "+proj=utm +zone=59");
    }

    #[cfg(feature = "proj")]
    #[test]
    fn esri_wkt_converts_to_geographic_proj_string() {
        let proj = to_proj_string(ESRI_WGS84).unwrap();
        assert!(is_latlong(&proj), "{proj}");

        // same reference as a plain longlat grid: coordinates stay put
        use geo::{MultiPolygon, polygon};
        let square = MultiPolygon(vec![polygon![
            (x: 172.0, y: -41.0), (x: 172.1, y: -41.0), (x: 172.1, y: -40.9), (x: 172.0, y: -40.9),
        ]]);
        let out = transform_features(&[(square, 1u32)], &proj, "+proj=longlat +datum=WGS84 +no_defs").unwrap();
        let c = out[0].0 .0[0].exterior().0[0];
        assert!((c.x - 172.0).abs() < 1e-6 && (c.y + 41.0).abs() < 1e-6, "{c:?}");
    }

    #[cfg(feature = "proj")]
    #[test]
    fn transforms_lonlat_to_utm_and_back() {
        use geo::{MultiPolygon, polygon};

        let geog = "+proj=longlat +datum=WGS84 +no_defs";
        let utm = "+proj=utm +zone=59 +south +datum=WGS84 +units=m +no_defs";
        let square = MultiPolygon(vec![polygon![
            (x: 172.0, y: -41.0), (x: 172.1, y: -41.0), (x: 172.1, y: -40.9), (x: 172.0, y: -40.9),
        ]]);
        let there = transform_features(&[(square.clone(), 1u32)], geog, utm).unwrap();
        let first = there[0].0 .0[0].exterior().0[0];
        assert!(first.x > 100_000.0 && first.x < 900_000.0);
        assert!(first.y > 5_000_000.0);

        let back = transform_features(&there, utm, geog).unwrap();
        let c = back[0].0 .0[0].exterior().0[0];
        assert!((c.x - 172.0).abs() < 1e-6 && (c.y + 41.0).abs() < 1e-6);
    }
}
