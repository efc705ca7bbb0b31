use crate::{options::Fill, save};
use anyhow::{bail, Result};
use coincide::{temporal_fill, RasterStack};
use georaster::{outname, raster_list, BilIo, RasterIo, SampleType};
use std::fs;

impl Fill {
    pub fn run(&self) -> Result<()> {
        let inputs = raster_list(&self.input)?;
        if inputs.is_empty() {
            bail!("no rasters in {:?}", self.input);
        }
        let io = BilIo::default();
        let layers = inputs
            .iter()
            .map(|path| io.read(path))
            .collect::<Result<Vec<_>, _>>()?;
        let series = temporal_fill(&RasterStack::new(layers)?)?;

        if let Some(dir) = &self.out_dir {
            fs::create_dir_all(dir)?;
        }
        let out_dir = self.out_dir.as_deref();
        for ((input, filled), age) in inputs.iter().zip(&series.filled).zip(&series.age) {
            save(
                &io,
                filled,
                &outname(out_dir, input, &self.suffix, None),
                SampleType::Float32,
            )?;
            save(
                &io,
                age,
                &outname(out_dir, input, "age", None),
                SampleType::Int32,
            )?;
        }
        Ok(())
    }
}
