use clap::{Args, Parser};
use coincide::{Resampling, Statistic};
use georaster::SampleType;
use std::path::PathBuf;

/// Snap, stack and compare rasters.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub enum Cli {
    /// Conform rasters to the grid of a reference raster.
    Match(Match),

    /// Mask the cells where two rasters both hold data.
    Overlap(Overlap),

    /// Compute per-pixel statistics across coincident rasters.
    Stats(Stats),

    /// Re-grid rasters to the cell size of a reference raster.
    Resample(Resample),

    /// Declare a NoData value, or turn a range of values into NoData.
    Null(Null),

    /// Fill voids in a time series with the last good value.
    Fill(Fill),

    /// Cut rasters to a polygon, masking cells outside it.
    Clip(Clip),

    /// Print a summary of each raster.
    Info(Info),
}

#[derive(Debug, Clone, Args)]
pub struct Match {
    /// Raster whose grid every input is snapped to.
    #[arg(short, long)]
    pub reference: PathBuf,

    /// Output directory. Defaults to each input's directory.
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Appended to input file stems to name outputs.
    #[arg(short, long, default_value = "matched")]
    pub suffix: String,

    /// NoData value of outputs. Defaults to each input's.
    #[arg(short, long, allow_negative_numbers = true)]
    pub nodata: Option<f32>,

    #[arg(short = 't', long, default_value_t = SampleType::Float32)]
    pub sample_type: SampleType,

    /// Resample inputs whose cell size differs from the reference.
    /// Without this such inputs fail.
    #[arg(short = 'm', long)]
    pub resampling: Option<Resampling>,

    /// Stop at the first failure.
    #[arg(long)]
    pub fail_fast: bool,

    /// Per-input time limit in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Number of inputs processed concurrently.
    #[arg(short, long, default_value_t = 1)]
    pub workers: usize,

    /// Memory map inputs instead of reading them.
    #[arg(long)]
    pub mmap: bool,

    /// Print a JSON report to stdout.
    #[arg(long)]
    pub json: bool,

    /// Input rasters, or directories of rasters.
    #[arg(required = true)]
    pub input: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct Overlap {
    /// Snap `b` to the grid of `a` first.
    #[arg(long)]
    pub snap: bool,

    /// Output mask.
    #[arg(short, long)]
    pub out: PathBuf,

    pub a: PathBuf,

    pub b: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct Stats {
    #[arg(short, long)]
    pub out_dir: PathBuf,

    /// Outputs are named `<name>_<STATISTIC>.bil`.
    #[arg(short, long, default_value = "stats")]
    pub name: String,

    #[arg(
        short,
        long = "statistic",
        value_delimiter = ',',
        default_values_t = Statistic::ALL
    )]
    pub statistics: Vec<Statistic>,

    /// Ignore values below this.
    #[arg(long, allow_negative_numbers = true)]
    pub low: Option<f32>,

    /// Ignore values above this.
    #[arg(long, allow_negative_numbers = true)]
    pub high: Option<f32>,

    /// Coincident input rasters, or directories of rasters.
    #[arg(required = true)]
    pub input: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct Resample {
    /// Raster whose cell size inputs are resampled to.
    #[arg(short, long)]
    pub reference: PathBuf,

    #[arg(short, long, default_value_t = Resampling::Nearest)]
    pub method: Resampling,

    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    #[arg(short, long, default_value = "p")]
    pub suffix: String,

    #[arg(required = true)]
    pub input: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct Null {
    /// New NoData value.
    #[arg(short, long, allow_negative_numbers = true)]
    pub define: Option<f32>,

    /// Turn values at or above this into NoData.
    #[arg(short, long, allow_negative_numbers = true)]
    pub above: Option<f32>,

    /// Turn values at or below this into NoData.
    #[arg(short, long, allow_negative_numbers = true)]
    pub below: Option<f32>,

    /// Sample type rasters are rewritten as when a range is nulled.
    #[arg(short = 't', long, default_value_t = SampleType::Float32)]
    pub sample_type: SampleType,

    /// Rasters to modify in place.
    #[arg(required = true)]
    pub input: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct Fill {
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    #[arg(short, long, default_value = "filled")]
    pub suffix: String,

    /// Coincident rasters, oldest first by file name.
    #[arg(required = true)]
    pub input: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct Clip {
    /// JSON file holding the polygon's exterior ring as `[[x, y], ...]`
    /// in the rasters' projection.
    #[arg(short, long)]
    pub polygon: PathBuf,

    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    #[arg(short, long, default_value = "c")]
    pub suffix: String,

    #[arg(short = 't', long, default_value_t = SampleType::Float32)]
    pub sample_type: SampleType,

    #[arg(required = true)]
    pub input: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct Info {
    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,

    #[arg(required = true)]
    pub input: Vec<PathBuf>,
}
