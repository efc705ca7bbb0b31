use crate::{MatchError, RasterStack};
use georaster::RasterBuffer;

/// NoData of age rasters: the pixel has never been observed.
pub const AGE_NODATA: f32 = -1.0;

/// Output of [temporal_fill], one entry per input step.
#[derive(Debug, Clone)]
pub struct FilledSeries {
    /// Each step with voids filled from the last good value.
    pub filled: Vec<RasterBuffer>,
    /// Steps since each filled value was observed, `0` for fresh data.
    pub age: Vec<RasterBuffer>,
}

/// Steps forward through a time ordered `series`, filling each
/// layer's NoData from the most recent earlier layer that had data.
///
/// Filled layers keep their own NoData sentinel, which remains only
/// where no earlier layer had data either.
#[allow(clippy::cast_precision_loss)]
pub fn temporal_fill(series: &RasterStack) -> Result<FilledSeries, MatchError> {
    let grid = series.grid();
    let mut last: Vec<Option<(f32, usize)>> = vec![None; grid.len()];
    let mut filled = Vec::with_capacity(series.depth());
    let mut age = Vec::with_capacity(series.depth());

    for (step, layer) in series.layers().iter().enumerate() {
        let mut values = Vec::with_capacity(grid.len());
        let mut ages = Vec::with_capacity(grid.len());
        for (v, seen) in layer.iter().zip(last.iter_mut()) {
            if !layer.is_nodata(v) {
                *seen = Some((v, step));
            }
            match seen {
                Some((value, when)) => {
                    values.push(*value);
                    ages.push((step - *when) as f32);
                }
                None => {
                    values.push(layer.nodata());
                    ages.push(AGE_NODATA);
                }
            }
        }
        filled.push(RasterBuffer::new(grid.clone(), layer.nodata(), values)?);
        age.push(RasterBuffer::new(grid.clone(), AGE_NODATA, ages)?);
    }

    Ok(FilledSeries { filled, age })
}
