mod clip;
mod fill;
mod info;
mod matching;
mod null;
mod options;
mod overlap;
mod progress;
mod resample;
mod stats;

use anyhow::Result;
use clap::Parser;
use georaster::{BilIo, RasterBuffer, RasterIo, SampleType};
use log::{info, warn};
use options::Cli;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli {
        Cli::Match(cmd) => cmd.run(),
        Cli::Overlap(cmd) => cmd.run(),
        Cli::Stats(cmd) => cmd.run(),
        Cli::Resample(cmd) => cmd.run(),
        Cli::Null(cmd) => cmd.run(),
        Cli::Fill(cmd) => cmd.run(),
        Cli::Clip(cmd) => cmd.run(),
        Cli::Info(cmd) => cmd.run(),
    }
}

/// Writes `raster` to `path`, logging any metadata left behind.
fn save(io: &BilIo, raster: &RasterBuffer, path: &Path, sample_type: SampleType) -> Result<()> {
    for warning in io.write(raster, path, sample_type)?.warnings() {
        warn!("{warning}");
    }
    info!("wrote {path:?}");
    Ok(())
}
