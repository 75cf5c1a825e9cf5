mod affine;
mod rasterize;
pub mod resample;
mod width;

pub use affine::Affine;
pub use rasterize::rasterize;
pub use resample::{block_mode, block_sum};
pub use width::IndexWidth;
