use ahash::AHashMap;
use ndarray::{Array2, ArrayView1, ArrayViewD, Axis, Ix1, Ix2, Zip, stack};

use crate::{Error, Result, vector::PolyKey};

use super::{GridPolyConv, MaskedArray};

impl<K: PolyKey> GridPolyConv<K> {
    /// Spread per-polygon `values` onto the grid.
    ///
    /// `index` names the polygon of each position along the last axis of
    /// `values`; it must cover every key of this conversion, and may hold
    /// extra keys or a different order. `fill` is used where no polygon
    /// covers a cell (and, when refined, for the uncovered share of a cell).
    ///
    /// 1-D values `(npoly,)` give a 2-D `(nrow, ncol)` array, 2-D values
    /// `(n, npoly)` give a 3-D `(n, nrow, ncol)` array.
    pub fn array_from_values(
        &self,
        index: &[K],
        values: ArrayViewD<'_, f64>,
        fill: f64,
        enforce1d: bool,
    ) -> Result<MaskedArray> {
        let ndim = values.ndim();
        if !matches!(ndim, 1 | 2) {
            return Err(Error::data(format!("expected values to have 1 or 2 dimensions; found {ndim}")));
        }
        if index.len() != values.shape()[ndim - 1] {
            return Err(Error::data(format!(
                "length of last dimension of values ({}) does not match index length ({})",
                values.shape()[ndim - 1],
                index.len()
            )));
        }
        tracing::info!("reading array from values with shape {:?}", values.shape());
        if enforce1d && ndim != 1 {
            return Err(Error::data("values must have one dimension"));
        }

        let rows = match ndim {
            1 => values.into_dimensionality::<Ix1>().map_err(anyhow::Error::from)?.insert_axis(Axis(0)),
            _ => values.into_dimensionality::<Ix2>().map_err(anyhow::Error::from)?,
        };

        let rows = if index == self.poly_idx() {
            rows.to_owned()
        } else {
            let order = self.value_order(index)?;
            let rows = rows.select(Axis(1), &order);
            tracing::info!("subset/re-ordered values to shape {:?}", rows.shape());
            rows
        };

        let layers: Vec<Array2<f64>> = rows.outer_iter().map(|row| self.gather(row, fill)).collect();
        let data = if ndim == 1 {
            layers.into_iter().next().unwrap_or_else(|| Array2::zeros(self.shape())).into_dyn()
        } else {
            let views: Vec<_> = layers.iter().map(|l| l.view()).collect();
            if views.is_empty() {
                let (nrow, ncol) = self.shape();
                ndarray::Array3::<f64>::zeros((0, nrow, ncol)).into_dyn()
            } else {
                stack(Axis(0), &views).map_err(anyhow::Error::from)?.into_dyn()
            }
        };

        Ok(MaskedArray::new(data, self.mask().to_owned()))
    }

    /// Position in `index` of every conversion key, in key order.
    fn value_order(&self, index: &[K]) -> Result<Vec<usize>> {
        let mut positions: AHashMap<&K, usize> = AHashMap::with_capacity(index.len());
        for (i, key) in index.iter().enumerate() {
            positions.entry(key).or_insert(i);
        }

        if !self.poly_idx().iter().any(|k| positions.contains_key(k)) {
            return Err(Error::data("index is disjoint from poly_idx"));
        }

        self.poly_idx()
            .iter()
            .map(|k| positions.get(k).copied())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::data("index is not a superset of poly_idx"))
    }

    /// One 2-D layer: `row` looked up through the index raster, with `fill`
    /// standing in for index 0.
    fn gather(&self, row: ArrayView1<'_, f64>, fill: f64) -> Array2<f64> {
        let mut lut = Vec::with_capacity(row.len() + 1);
        lut.push(fill);
        lut.extend(row.iter().copied());

        let Some((index, weight)) = self.levels() else {
            return self.raster().level(0).mapv(|i| lut[i as usize]);
        };

        let mut out = Array2::<f64>::zeros(self.shape());
        for (lev_index, lev_weight) in index.outer_iter().zip(weight.outer_iter()) {
            Zip::from(&mut out)
                .and(&lev_index)
                .and(&lev_weight)
                .for_each(|o, &i, &w| *o += lut[i as usize] * w);
        }
        if fill != 0.0 {
            let covered = weight.sum_axis(Axis(0));
            Zip::from(&mut out)
                .and(&covered)
                .for_each(|o, &c| *o += (1.0 - c.clamp(0.0, 1.0)) * fill);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conv::IndexRaster;
    use ndarray::{Array3, arr1, arr2, arr3};

    fn raw(ar: &MaskedArray, idx: &[usize]) -> f64 {
        ar.data()[idx]
    }

    fn quadrants() -> GridPolyConv<i64> {
        let idx = arr2(&[
            [1, 1, 0, 0],
            [1, 1, 0, 0],
            [0, 0, 2, 2],
            [0, 0, 2, 2],
        ]);
        GridPolyConv::new(vec![10, 20], IndexRaster::Single(idx)).unwrap()
    }

    fn split_cells() -> GridPolyConv<i64> {
        let index = arr3(&[[[1, 2, 0]], [[2, 0, 0]]]);
        let count = arr3(&[[[2, 4, 0]], [[2, 0, 0]]]);
        GridPolyConv::new(vec![10, 20], IndexRaster::Levels { index, count }).unwrap()
    }

    #[test]
    fn gathers_values_into_quadrants() {
        let conv = quadrants();
        let ar = conv.array_from_values(&[10, 20], arr1(&[100.0, 200.0]).view().into_dyn(), 0.0, false).unwrap();
        assert_eq!(ar.ndim(), 2);
        assert_eq!(ar.get(&[0, 0]), Some(100.0));
        assert_eq!(ar.get(&[3, 3]), Some(200.0));
        assert_eq!(ar.get(&[0, 3]), None);
        assert_eq!(raw(&ar, &[0, 3]), 0.0);
        assert_eq!(ar.mask(), conv.mask());
    }

    #[test]
    fn reordered_and_extra_keys_match_canonical() {
        let conv = quadrants();
        let canonical = conv.array_from_values(&[10, 20], arr1(&[1.5, 2.5]).view().into_dyn(), 0.0, false).unwrap();
        let permuted = conv
            .array_from_values(&[30, 20, 10], arr1(&[9.0, 2.5, 1.5]).view().into_dyn(), 0.0, false)
            .unwrap();
        assert_eq!(canonical, permuted);
    }

    #[test]
    fn two_dimensional_values_stack_layers() {
        let conv = quadrants();
        let values = arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let ar = conv.array_from_values(&[10, 20], values.view().into_dyn(), -1.0, false).unwrap();
        assert_eq!(ar.shape(), &[3, 4, 4]);
        assert_eq!(ar.get(&[2, 0, 0]), Some(5.0));
        assert_eq!(ar.get(&[1, 3, 3]), Some(4.0));
        assert_eq!(raw(&ar, &[0, 0, 3]), -1.0);

        let err = conv.array_from_values(&[10, 20], values.view().into_dyn(), 0.0, true);
        assert!(matches!(err, Err(Error::Data(_))));
    }

    #[test]
    fn weighted_levels_blend_values() {
        let conv = split_cells();
        let ar = conv.array_from_values(&[10, 20], arr1(&[100.0, 200.0]).view().into_dyn(), 0.0, false).unwrap();
        assert_eq!(ar.get(&[0, 0]), Some(150.0));
        assert_eq!(ar.get(&[0, 1]), Some(200.0));
        assert_eq!(ar.get(&[0, 2]), None);
        assert_eq!(raw(&ar, &[0, 2]), 0.0);
    }

    #[test]
    fn nonzero_fill_covers_uncovered_share_only() {
        let conv = split_cells();
        let ar = conv.array_from_values(&[10, 20], arr1(&[100.0, 200.0]).view().into_dyn(), 7.0, false).unwrap();
        // covered cells are unchanged, the uncovered cell gets the fill
        assert_eq!(raw(&ar, &[0, 0]), 150.0);
        assert_eq!(raw(&ar, &[0, 1]), 200.0);
        assert_eq!(raw(&ar, &[0, 2]), 7.0);
    }

    #[test]
    fn partially_counted_cell_gets_fill_share() {
        // weights that do not reach 1 (assembled directly)
        let index = arr3(&[[[1]]]);
        let count = Array3::from_elem((1, 1, 1), 0u32);
        let conv = GridPolyConv::new(vec![1i64], IndexRaster::Levels { index, count }).unwrap();
        let ar = conv.array_from_values(&[1], arr1(&[5.0]).view().into_dyn(), 2.0, false).unwrap();
        assert_eq!(raw(&ar, &[0, 0]), 2.0);
        let zero = conv.array_from_values(&[1], arr1(&[5.0]).view().into_dyn(), 0.0, false).unwrap();
        assert_eq!(raw(&zero, &[0, 0]), 0.0);
    }

    #[test]
    fn projection_is_repeatable() {
        let conv = split_cells();
        let values = arr1(&[1.25, -3.5]);
        let a = conv.array_from_values(&[20, 10], values.view().into_dyn(), 1.0, false).unwrap();
        let b = conv.array_from_values(&[20, 10], values.view().into_dyn(), 1.0, false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_misaligned_values() {
        let conv = quadrants();
        let short = conv.array_from_values(&[10, 20], arr1(&[1.0]).view().into_dyn(), 0.0, false);
        assert!(matches!(short, Err(Error::Data(_))));

        let cube = Array3::<f64>::zeros((1, 1, 2));
        let err = conv.array_from_values(&[10, 20], cube.view().into_dyn(), 0.0, false);
        assert!(matches!(err, Err(Error::Data(_))));

        let disjoint = conv.array_from_values(&[1, 2], arr1(&[1.0, 2.0]).view().into_dyn(), 0.0, false);
        assert!(matches!(&disjoint, Err(Error::Data(msg)) if msg.contains("disjoint")));

        let partial = conv.array_from_values(&[10, 30], arr1(&[1.0, 2.0]).view().into_dyn(), 0.0, false);
        assert!(matches!(&partial, Err(Error::Data(msg)) if msg.contains("superset")));
    }
}
