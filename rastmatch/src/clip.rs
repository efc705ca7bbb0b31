use crate::{options::Clip, progress, save};
use anyhow::{bail, Context, Result};
use coincide::clip_to_polygon;
use geo::{LineString, Polygon};
use georaster::{outname, raster_list, BilIo, RasterIo, C};
use log::warn;
use std::{fs, path::Path};

impl Clip {
    pub fn run(&self) -> Result<()> {
        let polygon = read_polygon(&self.polygon)?;
        let io = BilIo::default();
        let inputs = raster_list(&self.input)?;
        if let Some(dir) = &self.out_dir {
            fs::create_dir_all(dir)?;
        }

        let pb = progress::bar(
            format!("Clip to {}", self.polygon.display()),
            inputs.len() as u64,
        );
        let mut failed = 0;
        for input in &inputs {
            if let Err(e) = self.clip_one(&io, &polygon, input) {
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

    fn clip_one(&self, io: &BilIo, polygon: &Polygon<C>, input: &Path) -> Result<()> {
        let raster = io.read(input)?;
        let clipped = clip_to_polygon(&raster, polygon)?;
        if clipped.grid().is_empty() {
            bail!("no cells inside the polygon");
        }
        let out = outname(self.out_dir.as_deref(), input, &self.suffix, None);
        save(io, &clipped, &out, self.sample_type)
    }
}

/// Reads an exterior ring written as a JSON array of `[x, y]` pairs.
fn read_polygon(path: &Path) -> Result<Polygon<C>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let ring: Vec<(C, C)> =
        serde_json::from_str(&text).with_context(|| format!("parsing {path:?}"))?;
    if ring.len() < 3 {
        bail!("{path:?}: a polygon needs at least 3 vertices");
    }
    Ok(Polygon::new(LineString::from(ring), vec![]))
}
