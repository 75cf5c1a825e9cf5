use std::path::PathBuf;

/// Grid-polygon conversion CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "gridconv", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Digitize polygons onto a grid and write the index raster
    Digitize(DigitizeArgs),

    /// Spread a catchment series over a grid, one array per time statistic
    Series(SeriesArgs),
}

/// Grid definition from the extent of a vector file.
#[derive(clap::Args, Debug)]
pub struct GridArgs {
    /// Vector file whose extent defines the grid
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub grid_from_vector: PathBuf,

    /// Cell size in projection units
    #[arg(long)]
    pub resolution: f64,

    /// Distance added around the vector extent
    #[arg(long, default_value_t = 0.0)]
    pub buffer: f64,

    /// Grid projection as a PROJ string, e.g. "+proj=utm +zone=59 +south"
    #[arg(long)]
    pub projection: Option<String>,
}

/// Polygons and how they are digitized.
#[derive(clap::Args, Debug)]
pub struct VectorArgs {
    /// Polygon shapefile
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub vector: PathBuf,

    /// Attribute holding the unique polygon key
    #[arg(long)]
    pub attribute: String,

    /// Sub-cell samples per cell side; 1 disables refinement
    #[arg(long, default_value_t = 5)]
    pub refine: u32,

    /// Maximum number of polygons kept per cell when refined
    #[arg(long, default_value_t = 5)]
    pub max_levels: u32,

    /// Cache mode: 0 off, 1 standard, 2 strict (also matches geometry)
    #[arg(long, default_value_t = 1)]
    pub caching: u8,
}

#[derive(clap::Args, Debug)]
pub struct DigitizeArgs {
    #[command(flatten)]
    pub grid: GridArgs,

    #[command(flatten)]
    pub vector: VectorArgs,

    /// Output text file for the level-0 index raster
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub write_text: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct SeriesArgs {
    #[command(flatten)]
    pub grid: GridArgs,

    #[command(flatten)]
    pub vector: VectorArgs,

    /// Long-format CSV with one row per catchment (and time step)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub csv: PathBuf,

    /// CSV column holding the polygon key
    #[arg(long)]
    pub index_col: String,

    /// CSV column holding the values
    #[arg(long)]
    pub value_col: String,

    /// CSV column holding dates (%Y-%m-%d)
    #[arg(long)]
    pub time_col: Option<String>,

    /// Time statistics, e.g. "mean", "Jul-Jun:min,max", "quantile(0.75)"
    #[arg(long, default_value = "mean")]
    pub time_stats: String,

    /// Value for cells not covered by any polygon
    #[arg(long, default_value_t = 0.0)]
    pub fill: f64,

    /// Member to select from an extra series dimension
    #[arg(long)]
    pub xidx: Option<usize>,

    /// Output text file; one file per statistic, named <stem>_<stat><ext>
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub write_text: PathBuf,
}
