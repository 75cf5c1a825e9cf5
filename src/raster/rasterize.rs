use geo::{LineString, MultiPolygon};
use ndarray::Array2;

use crate::{Error, Result};

use super::Affine;

/// Burn `(geometry, value)` pairs into a `shape` array on the grid described
/// by `transform`.
///
/// A cell is burned when its centre falls inside the geometry (even-odd rule
/// over every ring, so holes stay unburned). Shapes are burned in order and
/// later shapes overwrite earlier ones. Cells no shape reaches keep `fill`.
pub fn rasterize(
    shapes: &[(MultiPolygon<f64>, u32)],
    shape: (usize, usize),
    transform: &Affine,
    fill: u32,
) -> Result<Array2<u32>> {
    let (nrow, ncol) = shape;
    let inverse = transform
        .inverse()
        .ok_or_else(|| Error::data(format!("grid transform is not invertible: {transform}")))?;

    let mut out = Array2::from_elem(shape, fill);
    if nrow == 0 || ncol == 0 {
        return Ok(out);
    }

    let mut crossings: Vec<f64> = Vec::new();
    for (geom, value) in shapes {
        let edges = pixel_edges(geom, &inverse);
        if edges.is_empty() {
            continue;
        }

        let (ymin, ymax) = edges.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), e| {
            (lo.min(e.y0.min(e.y1)), hi.max(e.y0.max(e.y1)))
        });
        let row_start = ((ymin - 0.5).ceil().max(0.0)) as usize;
        let row_end = ((ymax - 0.5).ceil().max(0.0) as usize).min(nrow);

        for row in row_start..row_end {
            let yc = row as f64 + 0.5;
            crossings.clear();
            for edge in &edges {
                if let Some(x) = edge.crossing(yc) {
                    crossings.push(x);
                }
            }
            if crossings.len() < 2 {
                continue;
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            for span in crossings.chunks_exact(2) {
                let col_start = ((span[0] - 0.5).ceil().max(0.0)) as usize;
                let col_end = ((span[1] - 0.5).ceil().max(0.0) as usize).min(ncol);
                for col in col_start..col_end {
                    out[[row, col]] = *value;
                }
            }
        }
    }

    Ok(out)
}

/// Polygon edge in (col, row) pixel space.
struct Edge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl Edge {
    /// Column where the edge crosses the horizontal line `y`, half-open on
    /// the upper end so shared vertices are counted once.
    #[inline]
    fn crossing(&self, y: f64) -> Option<f64> {
        let spans = (self.y0 <= y && self.y1 > y) || (self.y1 <= y && self.y0 > y);
        spans.then(|| self.x0 + (y - self.y0) * (self.x1 - self.x0) / (self.y1 - self.y0))
    }
}

fn pixel_edges(geom: &MultiPolygon<f64>, inverse: &Affine) -> Vec<Edge> {
    fn push_ring(ring: &LineString<f64>, inverse: &Affine, edges: &mut Vec<Edge>) {
        for line in ring.lines() {
            let (x0, y0) = inverse.apply(line.start.x, line.start.y);
            let (x1, y1) = inverse.apply(line.end.x, line.end.y);
            if y0 != y1 {
                edges.push(Edge { x0, y0, x1, y1 });
            }
        }
    }

    let mut edges = Vec::new();
    for poly in &geom.0 {
        push_ring(poly.exterior(), inverse, &mut edges);
        for hole in poly.interiors() {
            push_ring(hole, inverse, &mut edges);
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPolygon, Polygon, polygon};

    fn unit_grid() -> Affine {
        // 1 m cells, top-left at (0, 4)
        Affine::new(1.0, 0.0, 0.0, 0.0, -1.0, 4.0)
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0),
        ]])
    }

    #[test]
    fn burns_cell_centres_inside_rectangle() {
        let shapes = vec![(rect(0.0, 2.0, 2.0, 4.0), 7)];
        let ar = rasterize(&shapes, (4, 4), &unit_grid(), 0).unwrap();
        let expected = ndarray::arr2(&[
            [7, 7, 0, 0],
            [7, 7, 0, 0],
            [0, 0, 0, 0],
            [0, 0, 0, 0],
        ]);
        assert_eq!(ar, expected);
    }

    #[test]
    fn later_shapes_win() {
        let shapes = vec![(rect(0.0, 0.0, 4.0, 4.0), 1), (rect(1.0, 1.0, 3.0, 3.0), 2)];
        let ar = rasterize(&shapes, (4, 4), &unit_grid(), 0).unwrap();
        assert_eq!(ar[[0, 0]], 1);
        assert_eq!(ar[[1, 1]], 2);
        assert_eq!(ar[[2, 2]], 2);
        assert_eq!(ar[[3, 3]], 1);
    }

    #[test]
    fn holes_are_not_burned() {
        let outer = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)];
        let hole = polygon![(x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 3.0), (x: 1.0, y: 3.0)];
        let donut = Polygon::new(outer.exterior().clone(), vec![hole.exterior().clone()]);
        let shapes = vec![(MultiPolygon(vec![donut]), 3)];
        let ar = rasterize(&shapes, (4, 4), &unit_grid(), 0).unwrap();
        assert_eq!(ar.iter().filter(|&&v| v == 3).count(), 12);
        assert_eq!(ar[[1, 1]], 0);
        assert_eq!(ar[[2, 2]], 0);
    }

    #[test]
    fn shapes_outside_grid_are_clipped() {
        let shapes = vec![(rect(-10.0, -10.0, 0.5, 10.0), 5), (rect(50.0, 50.0, 60.0, 60.0), 6)];
        let ar = rasterize(&shapes, (4, 4), &unit_grid(), 0).unwrap();
        // centre of column 0 is x=0.5, which is the shape's closed-open boundary
        assert!(ar.iter().all(|&v| v == 0));
    }
}
