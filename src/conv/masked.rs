use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, Axis, Ix2};

/// Projected values with a coverage mask.
///
/// `data` is 2-D `(nrow, ncol)` or 3-D `(n, nrow, ncol)`; the 2-D `mask` is
/// true where no polygon covers a cell and applies to every layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedArray {
    data: ArrayD<f64>,
    mask: Array2<bool>,
}

impl MaskedArray {
    pub(crate) fn new(data: ArrayD<f64>, mask: Array2<bool>) -> Self {
        debug_assert!(data.ndim() == 2 || data.ndim() == 3);
        debug_assert_eq!(&data.shape()[data.ndim() - 2..], mask.shape());
        Self { data, mask }
    }

    #[inline]
    pub fn data(&self) -> ArrayViewD<'_, f64> { self.data.view() }

    #[inline]
    pub fn mask(&self) -> ArrayView2<'_, bool> { self.mask.view() }

    #[inline]
    pub fn ndim(&self) -> usize { self.data.ndim() }

    #[inline]
    pub fn shape(&self) -> &[usize] { self.data.shape() }

    /// Number of 2-D layers (1 for a 2-D array).
    pub fn num_layers(&self) -> usize {
        if self.ndim() == 2 { 1 } else { self.data.len_of(Axis(0)) }
    }

    /// One 2-D layer of the data.
    pub fn layer(&self, i: usize) -> Option<ArrayView2<'_, f64>> {
        if i >= self.num_layers() {
            return None;
        }
        let view = if self.ndim() == 2 { self.data.view() } else { self.data.index_axis(Axis(0), i) };
        view.into_dimensionality::<Ix2>().ok()
    }

    /// Value at `index`, or `None` where masked or out of bounds.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() < 2 {
            return None;
        }
        let cell = &index[index.len() - 2..];
        if *self.mask.get((cell[0], cell[1]))? {
            return None;
        }
        self.data.get(index).copied()
    }

    /// Data with masked cells replaced by `value`.
    pub fn filled(&self, value: f64) -> ArrayD<f64> {
        let mut out = self.data.clone();
        let ndim = out.ndim();
        for (idx, v) in out.indexed_iter_mut() {
            if self.mask[[idx[ndim - 2], idx[ndim - 1]]] {
                *v = value;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, arr3};

    #[test]
    fn masked_cells_are_hidden() {
        let ar = MaskedArray::new(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(), arr2(&[[false, true], [false, false]]));
        assert_eq!(ar.get(&[0, 0]), Some(1.0));
        assert_eq!(ar.get(&[0, 1]), None);
        assert_eq!(ar.get(&[5, 5]), None);
        assert_eq!(ar.filled(-9.0), arr2(&[[1.0, -9.0], [3.0, 4.0]]).into_dyn());
    }

    #[test]
    fn layers_share_mask() {
        let data = arr3(&[[[1.0, 2.0]], [[3.0, 4.0]]]).into_dyn();
        let ar = MaskedArray::new(data, arr2(&[[true, false]]));
        assert_eq!(ar.num_layers(), 2);
        assert_eq!(ar.layer(1).unwrap(), arr2(&[[3.0, 4.0]]));
        assert!(ar.layer(2).is_none());
        assert_eq!(ar.get(&[1, 0, 0]), None);
        assert_eq!(ar.get(&[1, 0, 1]), Some(4.0));
    }
}
