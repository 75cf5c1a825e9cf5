//! Block reducers from a fine grid onto an aligned coarse grid.
//!
//! The fine grid is always an exact `factor`× subdivision of the coarse
//! grid, so each coarse cell reduces a `factor × factor` block.

use ndarray::{Array2, ArrayView2};

/// Dominant non-zero value in each block; 0 where a block is all zero.
/// Ties go to the smallest value.
pub fn block_mode(fine: ArrayView2<'_, u32>, factor: usize) -> Array2<u32> {
    let coarse = coarse_shape(fine.dim(), factor);
    let mut buf: Vec<u32> = Vec::with_capacity(factor * factor);

    let values = fine
        .exact_chunks((factor, factor))
        .into_iter()
        .map(|block| {
            buf.clear();
            buf.extend(block.iter().copied().filter(|&v| v != 0));
            buf.sort_unstable();

            let mut best = (0u32, 0usize);
            let mut i = 0;
            while i < buf.len() {
                let value = buf[i];
                let run = buf[i..].iter().take_while(|&&v| v == value).count();
                if run > best.1 {
                    best = (value, run);
                }
                i += run;
            }
            best.0
        })
        .collect::<Vec<_>>();

    Array2::from_shape_vec(coarse, values).expect("block count matches coarse shape")
}

/// Number of set cells in each block.
pub fn block_sum(fine: ArrayView2<'_, bool>, factor: usize) -> Array2<u32> {
    let coarse = coarse_shape(fine.dim(), factor);
    let values = fine
        .exact_chunks((factor, factor))
        .into_iter()
        .map(|block| block.iter().filter(|&&v| v).count() as u32)
        .collect::<Vec<_>>();

    Array2::from_shape_vec(coarse, values).expect("block count matches coarse shape")
}

#[inline]
fn coarse_shape((nrow, ncol): (usize, usize), factor: usize) -> (usize, usize) {
    debug_assert!(factor > 0);
    debug_assert!(nrow % factor == 0 && ncol % factor == 0, "fine grid must be a whole subdivision");
    (nrow / factor, ncol / factor)
}
