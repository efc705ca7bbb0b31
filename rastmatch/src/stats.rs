use crate::{options::Stats, save};
use anyhow::{bail, Result};
use coincide::{aggregate, RasterStack};
use georaster::{outname, raster_list, BilIo, RasterIo, SampleType};
use std::{collections::BTreeSet, fs, path::Path};

impl Stats {
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
        let stack = RasterStack::new(layers)?;
        let statistics: BTreeSet<_> = self.statistics.iter().copied().collect();

        fs::create_dir_all(&self.out_dir)?;
        let base = Path::new(&self.name).with_extension("bil");
        for (statistic, raster) in aggregate(&stack, &statistics, self.low, self.high)? {
            let suffix = statistic.to_string();
            let path = outname(Some(self.out_dir.as_path()), &base, &suffix, None);
            save(&io, &raster, &path, SampleType::Float32)?;
        }
        Ok(())
    }
}
