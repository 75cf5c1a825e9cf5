pub mod digitize;
pub mod series;

use anyhow::Result;
use gridconv::{CacheLevel, DigitizeOptions, Grid, GridPolyConv};

use crate::cli::{GridArgs, VectorArgs};

/// Grid from the extent of `--grid-from-vector`.
fn grid_from_args(args: &GridArgs) -> Result<Grid> {
    let grid = Grid::from_vector(&args.grid_from_vector, args.resolution, args.buffer, args.projection.clone())?;
    tracing::info!("{grid}");
    Ok(grid)
}

/// Conversion of `--vector` polygons onto `grid`.
fn conv_from_args(grid: &Grid, args: &VectorArgs) -> Result<GridPolyConv<gridconv::AttrValue>> {
    let options = DigitizeOptions {
        refine: args.refine,
        max_levels: args.max_levels,
        caching: CacheLevel::try_from(args.caching)?,
        cache_dirs: None,
    };
    Ok(GridPolyConv::from_grid_vector(grid, &args.vector, &args.attribute, &options)?)
}
