use std::path::PathBuf;

use clap::ValueEnum;

/// GADM / Impact Region reconciliation CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "impact-regions", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Explode the IR hierarchy into an IR to ADM2 link file (forbids stdout)
    Link(LinkArgs),

    /// Summarise IR / ADM2 relations of a link file (forbids stdout)
    Stats(StatsArgs),

    /// Sum a gridded population raster over GADM polygons for one year (forbids stdout)
    Population(PopulationArgs),

    /// Assemble the array bundle from a link file and population tables
    Bundle(BundleArgs),

    /// Classify ADM2s and write per-country GeoJSON files
    Geojson(GeojsonArgs),

    /// Run every stage from a JSON config
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub struct LinkArgs {
    /// Hierarchy table (hierarchy.csv)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub hierarchy: PathBuf,

    /// GADM attribute table (gadm2.csv)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub gadm: PathBuf,

    /// Metadata lines before the hierarchy header
    #[arg(long, default_value_t = 0)]
    pub skip_rows: usize,

    /// Output directory, defaults to "."
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct StatsArgs {
    /// Link file (ir_to_adm2_adm1.csv)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub links: PathBuf,

    /// Output directory, defaults to "."
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct PopulationArgs {
    /// Raster cell-centre samples as CSV (x, y, value)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub raster: PathBuf,

    /// GADM ADM2 shapefile
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub gadm_shapes: PathBuf,

    /// Year of the raster
    #[arg(short, long)]
    pub year: i32,

    /// Output directory, defaults to "."
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
pub enum Policy { Sum, Reject }

#[derive(clap::Args, Debug)]
pub struct BundleArgs {
    /// Link file (ir_to_adm2_adm1.csv)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub links: PathBuf,

    /// Directory of population_by_adm2_<year>.csv files
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub population: PathBuf,

    /// Output bundle directory
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: PathBuf,

    /// Repeated (ADM2, year) rows are summed or rejected
    #[arg(long, value_enum, default_value_t = Policy::Sum)]
    pub duplicates: Policy,

    /// Restrict to these ISO codes (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub countries: Option<Vec<String>>,
}

#[derive(clap::Args, Debug)]
pub struct GeojsonArgs {
    /// Link file (ir_to_adm2_adm1.csv)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub links: PathBuf,

    /// GADM ADM2 shapefile
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub gadm_shapes: PathBuf,

    /// IR shapefile
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub ir_shapes: PathBuf,

    /// Output directory
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: PathBuf,

    /// Restrict to these ISO codes (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub countries: Option<Vec<String>>,

    /// Replace existing ADM2 files
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Pipeline configuration (JSON)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,
}
