use anyhow::Result;
use gridconv::io::text::write_text;

use super::{conv_from_args, grid_from_args};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::DigitizeArgs) -> Result<()> {
    let grid = grid_from_args(&args.grid)?;
    let conv = conv_from_args(&grid, &args.vector)?;

    let levels = conv.raster().num_levels();
    let covered = conv.mask().iter().filter(|m| !**m).count();
    tracing::info!(
        "digitized {} polygons into {levels} level(s); {covered} of {} cells covered",
        conv.poly_idx().len(),
        conv.mask().len()
    );

    if let Some(out) = &args.write_text {
        let index = conv.raster().level(0).mapv(f64::from);
        write_text(out, index.view())?;
    }
    tracing::info!("done");
    Ok(())
}
