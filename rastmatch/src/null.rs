use crate::{options::Null, save};
use anyhow::{anyhow, bail, Result};
use georaster::{raster_list, BilIo, RasterIo};
use log::info;
use std::{fs, path::Path};

/// Prefix of the scratch directory an in-place rewrite is staged in.
const SCRATCH_PREFIX: &str = ".rastmatch-";

impl Null {
    pub fn run(&self) -> Result<()> {
        if self.define.is_none() && self.above.is_none() && self.below.is_none() {
            bail!("nothing to do, pass --define, --above or --below");
        }
        let io = BilIo::default();
        for input in raster_list(&self.input)? {
            if self.above.is_none() && self.below.is_none() {
                if let Some(nodata) = self.define {
                    io.define_null(&input, nodata)?;
                    info!("set NoData {nodata} in {input:?}");
                }
            } else {
                self.null_range(&io, &input)?;
            }
        }
        Ok(())
    }

    /// Rewrites `input` with values in range replaced by NoData.
    ///
    /// The new raster is written into a scratch directory beside
    /// `input` and renamed over it only once the write succeeded.
    fn null_range(&self, io: &BilIo, input: &Path) -> Result<()> {
        let mut raster = io.read(input)?;
        if let Some(nodata) = self.define {
            raster.define_null(nodata);
        }
        let changed = raster.set_range_null(self.above, self.below);

        let file_name = input
            .file_name()
            .ok_or_else(|| anyhow!("{input:?} has no file name"))?;
        let parent = match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)?;
        let staged = scratch.path().join(file_name);
        save(io, &raster, &staged, self.sample_type)?;
        for (from, to) in io.files(&staged).into_iter().zip(io.files(input)) {
            if from.exists() {
                fs::rename(from, to)?;
            }
        }
        info!("set {changed} cells to NoData in {input:?}");
        Ok(())
    }
}
