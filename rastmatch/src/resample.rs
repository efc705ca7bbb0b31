use crate::{options::Resample, progress, save};
use anyhow::{bail, Result};
use coincide::{Reproject, Resampler};
use georaster::{outname, raster_list, BilIo, RasterIo, SampleType};
use log::warn;
use std::{fs, path::Path};

impl Resample {
    pub fn run(&self) -> Result<()> {
        let io = BilIo::default();
        let reference = io.read(&self.reference)?;
        let inputs = raster_list(&self.input)?;
        if let Some(dir) = &self.out_dir {
            fs::create_dir_all(dir)?;
        }

        let pb = progress::bar(
            format!("Resample to {}", reference.cell()),
            inputs.len() as u64,
        );
        let mut failed = 0;
        for input in &inputs {
            if let Err(e) = self.resample_one(&io, &reference, input) {
                warn!("{input:?}: {e}");
                failed += 1;
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        if failed > 0 {
            bail!("{failed} of {} rasters failed", inputs.len());
        }
        Ok(())
    }

    fn resample_one(
        &self,
        io: &BilIo,
        reference: &georaster::RasterBuffer,
        input: &Path,
    ) -> Result<()> {
        let raster = io.read(input)?;
        let resampled = Resampler.reproject(
            &raster,
            reference.projection(),
            Some(self.method),
            reference.cell(),
        )?;
        let out = outname(self.out_dir.as_deref(), input, &self.suffix, None);
        save(io, &resampled, &out, SampleType::Float32)
    }
}
