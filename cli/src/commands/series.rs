use anyhow::{Context, Result};
use gridconv::io::{csv::read_series_csv, text::{part_path, write_text}};
use gridconv::TimeStats;
use ndarray::Axis;

use super::{conv_from_args, grid_from_args};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::SeriesArgs) -> Result<()> {
    // fail on a bad statistics string before reading any data
    let time_stats: TimeStats = args
        .time_stats
        .parse()
        .with_context(|| format!("--time-stats: {:?}", args.time_stats))?;

    let grid = grid_from_args(&args.grid)?;
    let conv = conv_from_args(&grid, &args.vector)?;
    let series = read_series_csv(&args.csv, &args.index_col, args.time_col.as_deref(), &args.value_col)?;

    let arrays = conv.array_from_series(&series, Some(&time_stats), args.xidx, args.fill, false)?;
    for (key, ar) in &arrays {
        tracing::info!("time stats: {}", key.as_deref().unwrap_or("none"));
        let filled = ar.filled(args.fill);
        if ar.ndim() == 3 {
            // first and last time step only
            let n = ar.num_layers();
            let mut idxs = vec![0];
            if n > 1 {
                idxs.push(n - 1);
            }
            for idx in idxs {
                let part = match key {
                    Some(k) => format!("{k} {idx}"),
                    None => idx.to_string(),
                };
                let layer = filled.index_axis(Axis(0), idx).into_dimensionality()?;
                write_text(&part_path(&args.write_text, &part), layer)?;
            }
        } else {
            let out = match key {
                Some(k) => part_path(&args.write_text, k),
                None => args.write_text.clone(),
            };
            write_text(&out, filled.view().into_dimensionality()?)?;
        }
    }
    tracing::info!("done");
    Ok(())
}
