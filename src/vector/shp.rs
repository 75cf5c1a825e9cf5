//! ESRI Shapefile polygon sources.

use std::path::Path;

use crate::{Error, Result};

use super::{AttrValue, PolygonSource};

/// Read every polygon of a shapefile, keyed by `attribute`.
///
/// The sibling `.prj` file, if present, is kept as the source's CRS descriptor.
#[cfg(feature = "shapefile")]
pub fn read_polygons(path: &Path, attribute: &str) -> Result<PolygonSource<AttrValue>> {
    use anyhow::Context;
    use shapefile::{Reader, Shape};

    tracing::info!("reading polygon: {}", path.display());
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;

    let mut features = Vec::new();
    let mut skipped = 0usize;
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.context("Error reading shape+record")?;

        let Some(field) = record.get(attribute) else {
            let fields: Vec<String> = record.into_iter().map(|(name, _)| name).collect();
            return Err(Error::data(format!("could not find '{attribute}' in {fields:?}")));
        };
        let key = attr_value(attribute, field)?;

        match shape {
            Shape::Polygon(p) => features.push((shp_to_geo(&p), key)),
            Shape::NullShape => skipped += 1,
            other => {
                tracing::warn!("expected Polygon, found {:?}", other.shapetype());
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        tracing::warn!("skipped {skipped} non-polygon shapes");
    }

    let mut source = PolygonSource::new(features).with_path(path);
    let prj = path.with_extension("prj");
    if prj.is_file() {
        let crs = std::fs::read_to_string(&prj)
            .with_context(|| format!("Failed to read projection: {}", prj.display()))?;
        source = source.with_crs(crs.trim());
    }
    Ok(source)
}

#[cfg(not(feature = "shapefile"))]
pub fn read_polygons(_path: &Path, _attribute: &str) -> Result<PolygonSource<AttrValue>> {
    Err(Error::MissingCapability("reading polygons requires the `shapefile` feature"))
}

/// Bounding box `(xmin, ymin, xmax, ymax)` of every polygon in a shapefile.
#[cfg(feature = "shapefile")]
pub fn read_bounds(path: &Path) -> Result<(f64, f64, f64, f64)> {
    use anyhow::Context;
    use geo::BoundingRect;
    use shapefile::{Reader, Shape};

    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;

    let mut bounds: Option<(f64, f64, f64, f64)> = None;
    for result in reader.iter_shapes_and_records() {
        let (shape, _) = result.context("Error reading shape+record")?;
        let Shape::Polygon(p) = shape else { continue };
        let Some(rect) = shp_to_geo(&p).bounding_rect() else { continue };
        let (min, max) = (rect.min(), rect.max());
        bounds = Some(match bounds {
            None => (min.x, min.y, max.x, max.y),
            Some((x0, y0, x1, y1)) => (x0.min(min.x), y0.min(min.y), x1.max(max.x), y1.max(max.y)),
        });
    }
    bounds.ok_or(Error::NoFeatures)
}

#[cfg(not(feature = "shapefile"))]
pub fn read_bounds(_path: &Path) -> Result<(f64, f64, f64, f64)> {
    Err(Error::MissingCapability("reading polygons requires the `shapefile` feature"))
}

#[cfg(feature = "shapefile")]
fn attr_value(attribute: &str, field: &shapefile::dbase::FieldValue) -> Result<AttrValue> {
    use shapefile::dbase::FieldValue;

    let integral = |v: f64| -> Result<AttrValue> {
        if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
            Ok(AttrValue::Int(v as i64))
        } else {
            Err(Error::data(format!("'{attribute}' values must be integers or text; found {v}")))
        }
    };
    match field {
        FieldValue::Character(Some(s)) => Ok(AttrValue::Text(s.trim().to_owned())),
        FieldValue::Numeric(Some(v)) => integral(*v),
        FieldValue::Double(v) => integral(*v),
        FieldValue::Float(Some(v)) => integral(*v as f64),
        FieldValue::Integer(v) => Ok(AttrValue::Int(*v as i64)),
        other => Err(Error::data(format!("unsupported '{attribute}' value: {other:?}"))),
    }
}

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>
#[cfg(feature = "shapefile")]
pub fn shp_to_geo(p: &shapefile::Polygon) -> geo::MultiPolygon<f64> {
    /// Ensure first and last are the same for geo::LineString coords
    fn ensure_closed(coords: &mut Vec<geo::Coord<f64>>) {
        if !coords.is_empty() && coords[0] != coords[coords.len() - 1] {
            coords.push(coords[0])
        }
    }

    /// Get the signed area of a geo::Coord list (negative for clockwise)
    fn signed_area(pts: &[geo::Coord<f64>]) -> f64 {
        let mut a = 0.0;
        for w in pts.windows(2) {
            a += w[0].x * w[1].y - w[1].x * w[0].y;
        }
        a / 2.0
    }

    // Each exterior (clockwise in Shapefile) is followed by its holes.
    let mut polys: Vec<geo::Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<geo::LineString<f64>> = None;
    let mut current_holes: Vec<geo::LineString<f64>> = Vec::new();

    for ring in p.rings() {
        let mut coords: Vec<geo::Coord<f64>> = ring.points().iter().map(|pt| geo::Coord { x: pt.x, y: pt.y }).collect();
        ensure_closed(&mut coords);
        let is_exterior = signed_area(&coords) < 0.0;
        let ls = geo::LineString(coords);

        if is_exterior {
            if let Some(ext) = current_exterior.take() {
                polys.push(geo::Polygon::new(ext, std::mem::take(&mut current_holes)));
            }
            current_exterior = Some(ls);
        } else {
            current_holes.push(ls);
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(geo::Polygon::new(ext, current_holes));
    }

    geo::MultiPolygon(polys)
}

#[cfg(all(test, feature = "shapefile"))]
mod tests {
    use super::*;
    use shapefile::dbase::FieldValue;
    use shapefile::{Point, PolygonRing};

    #[test]
    fn rings_group_into_polygons_with_holes() {
        // exterior clockwise, hole counter-clockwise
        let outer = vec![
            Point { x: 0.0, y: 0.0 }, Point { x: 0.0, y: 4.0 }, Point { x: 4.0, y: 4.0 },
            Point { x: 4.0, y: 0.0 }, Point { x: 0.0, y: 0.0 },
        ];
        let hole = vec![
            Point { x: 1.0, y: 1.0 }, Point { x: 3.0, y: 1.0 }, Point { x: 3.0, y: 3.0 },
            Point { x: 1.0, y: 3.0 }, Point { x: 1.0, y: 1.0 },
        ];
        let p = shapefile::Polygon::with_rings(vec![PolygonRing::Outer(outer), PolygonRing::Inner(hole)]);
        let mp = shp_to_geo(&p);
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
    }

    #[test]
    fn attribute_values_must_be_integral_or_text() {
        assert_eq!(attr_value("rid", &FieldValue::Numeric(Some(12.0))).unwrap(), AttrValue::Int(12));
        assert_eq!(
            attr_value("name", &FieldValue::Character(Some(" Mana ".into()))).unwrap(),
            AttrValue::Text("Mana".into())
        );
        assert!(matches!(attr_value("k", &FieldValue::Numeric(Some(1.5))), Err(Error::Data(_))));
        assert!(matches!(attr_value("k", &FieldValue::Numeric(None)), Err(Error::Data(_))));
    }
}
