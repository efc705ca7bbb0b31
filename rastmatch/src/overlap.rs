use crate::{options::Overlap, save};
use anyhow::Result;
use coincide::{overlap, overlap_snapped};
use georaster::{BilIo, RasterIo, SampleType};

impl Overlap {
    pub fn run(&self) -> Result<()> {
        let io = BilIo::default();
        let a = io.read(&self.a)?;
        let b = io.read(&self.b)?;
        let mask = if self.snap {
            overlap_snapped(&a, &b)?
        } else {
            overlap(&a, &b)?
        };
        save(&io, &mask, &self.out, SampleType::Uint8)
    }
}
