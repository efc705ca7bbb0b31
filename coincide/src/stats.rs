//! Per-pixel statistics across a stack of coincident rasters.

use crate::MatchError;
use georaster::{Grid, RasterBuffer};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

/// NoData of every raster [aggregate] produces.
pub const STATS_NODATA: f32 = f32::NAN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Statistic {
    /// Mean of valid observations.
    Avg,
    /// Population standard deviation of valid observations.
    Std,
    /// Number of valid observations.
    Num,
}

impl Statistic {
    pub const ALL: [Self; 3] = [Self::Avg, Self::Std, Self::Num];
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Avg => "AVG",
            Self::Std => "STD",
            Self::Num => "NUM",
        };
        f.write_str(name)
    }
}

impl FromStr for Statistic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AVG" => Ok(Self::Avg),
            "STD" => Ok(Self::Std),
            "NUM" => Ok(Self::Num),
            other => Err(format!("unknown statistic {other:?}")),
        }
    }
}

/// Coincident rasters stacked along a third axis, first layer first.
#[derive(Debug, Clone)]
pub struct RasterStack {
    layers: Vec<RasterBuffer>,
}

impl RasterStack {
    pub fn new(layers: Vec<RasterBuffer>) -> Result<Self, MatchError> {
        let first = layers.first().ok_or(MatchError::EmptyStack)?;
        if layers.iter().any(|layer| !first.is_coincident(layer)) {
            return Err(MatchError::NotCoincident);
        }
        Ok(Self { layers })
    }

    /// Number of layers.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Georeferencing shared by every layer, taken from the first.
    pub fn grid(&self) -> &Grid {
        self.layers[0].grid()
    }

    pub fn layers(&self) -> &[RasterBuffer] {
        &self.layers
    }

    pub fn into_layers(self) -> Vec<RasterBuffer> {
        self.layers
    }

    /// Returns the samples at `(col, row)` through the stack, with
    /// each layer's NoData (and NaN) as `None`.
    pub fn pixel(&self, (col, row): (usize, usize)) -> Vec<Option<f32>> {
        self.layers
            .iter()
            .map(|layer| Some(layer.get_xy((col, row))).filter(|v| !layer.is_nodata(*v)))
            .collect()
    }
}

/// Welford running mean and variance.
#[derive(Default)]
struct Moments {
    n: u32,
    mean: f64,
    m2: f64,
}

impl Moments {
    fn push(&mut self, value: f64) {
        self.n += 1;
        let delta = value - self.mean;
        self.mean += delta / f64::from(self.n);
        self.m2 += delta * (value - self.mean);
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn get(&self, statistic: Statistic) -> f32 {
        match (statistic, self.n) {
            (Statistic::Num, n) => n as f32,
            (_, 0) => STATS_NODATA,
            (Statistic::Avg, _) => self.mean as f32,
            (Statistic::Std, n) => (self.m2 / f64::from(n)).sqrt() as f32,
        }
    }
}

/// Computes the requested per-pixel `statistics` over `stack`.
///
/// A sample counts as an observation unless it is its layer's NoData,
/// NaN, below `low` or above `high`. Pixels with no observations are
/// NoData in `Avg` and `Std` and `0` in `Num`. Every output has the
/// stack's georeferencing and [STATS_NODATA] as NoData.
pub fn aggregate(
    stack: &RasterStack,
    statistics: &BTreeSet<Statistic>,
    low: Option<f32>,
    high: Option<f32>,
) -> Result<BTreeMap<Statistic, RasterBuffer>, MatchError> {
    let grid = stack.grid();
    debug!(
        "aggregating {} layers of {}x{}, {statistics:?}",
        stack.depth(),
        grid.width,
        grid.height
    );
    let in_range = |v: f32| low.map_or(true, |low| v >= low) && high.map_or(true, |high| v <= high);

    let moments: Vec<Moments> = (0..grid.len())
        .into_par_iter()
        .map(|idx| {
            let xy = (idx % grid.width, idx / grid.width);
            let mut moments = Moments::default();
            for layer in stack.layers() {
                let v = layer.get_xy(xy);
                if !layer.is_nodata(v) && in_range(v) {
                    moments.push(f64::from(v));
                }
            }
            moments
        })
        .collect();

    statistics
        .iter()
        .map(|&statistic| -> Result<_, MatchError> {
            let samples = moments.iter().map(|m| m.get(statistic)).collect();
            let raster = RasterBuffer::new(grid.clone(), STATS_NODATA, samples)?;
            Ok((statistic, raster))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{aggregate, RasterStack, Statistic};
    use crate::{
        align::tests::{grid, raster},
        MatchError,
    };
    use approx::assert_relative_eq;
    use georaster::RasterBuffer;
    use std::collections::BTreeSet;

    fn layer(center: f32) -> RasterBuffer {
        let mut samples = vec![10.0; 9];
        samples[4] = center;
        raster(grid(3, 3, (0.0, 0.0), 1.0), -9999.0, samples)
    }

    fn all() -> BTreeSet<Statistic> {
        Statistic::ALL.into_iter().collect()
    }

    #[test]
    fn test_nodata_is_skipped() {
        let stack = RasterStack::new(vec![layer(1.0), layer(-9999.0), layer(3.0)]).unwrap();
        assert_eq!(stack.pixel((1, 1)), vec![Some(1.0), None, Some(3.0)]);
        let out = aggregate(&stack, &all(), None, None).unwrap();
        assert_eq!(out[&Statistic::Avg].get_xy((1, 1)), 2.0);
        assert_eq!(out[&Statistic::Num].get_xy((1, 1)), 2.0);
        assert_relative_eq!(out[&Statistic::Std].get_xy((1, 1)), 1.0);
        assert_eq!(out[&Statistic::Num].get_xy((0, 0)), 3.0);
        assert_eq!(out[&Statistic::Std].get_xy((0, 0)), 0.0);
        for raster in out.values() {
            assert!(raster.nodata().is_nan());
            assert_eq!(raster.grid(), stack.grid());
        }
    }

    #[test]
    fn test_only_requested_statistics() {
        let stack = RasterStack::new(vec![layer(1.0)]).unwrap();
        let wanted = [Statistic::Num].into_iter().collect();
        let out = aggregate(&stack, &wanted, None, None).unwrap();
        assert_eq!(out.keys().copied().collect::<Vec<_>>(), vec![Statistic::Num]);
    }

    #[test]
    fn test_thresholds() {
        let stack = RasterStack::new(vec![layer(1.0), layer(5.0), layer(9.0)]).unwrap();
        let out = aggregate(&stack, &all(), Some(2.0), Some(8.0)).unwrap();
        assert_eq!(out[&Statistic::Num].get_xy((1, 1)), 1.0);
        assert_eq!(out[&Statistic::Avg].get_xy((1, 1)), 5.0);
        // Outer cells are 10, above the threshold everywhere.
        assert_eq!(out[&Statistic::Num].get_xy((0, 0)), 0.0);
        assert!(!out[&Statistic::Avg].has_data((0, 0)));
    }

    #[test]
    fn test_zero_observations() {
        let stack = RasterStack::new(vec![layer(-9999.0), layer(f32::NAN)]).unwrap();
        let out = aggregate(&stack, &all(), None, None).unwrap();
        assert!(out[&Statistic::Avg].get_xy((1, 1)).is_nan());
        assert!(out[&Statistic::Std].get_xy((1, 1)).is_nan());
        assert_eq!(out[&Statistic::Num].get_xy((1, 1)), 0.0);
    }

    #[test]
    fn test_stack_checks() {
        assert!(matches!(
            RasterStack::new(Vec::new()),
            Err(MatchError::EmptyStack)
        ));
        let shifted = raster(grid(3, 3, (1.0, 0.0), 1.0), -9999.0, vec![0.0; 9]);
        assert!(matches!(
            RasterStack::new(vec![layer(1.0), shifted]),
            Err(MatchError::NotCoincident)
        ));
    }

    #[test]
    fn test_parse_statistic() {
        assert_eq!("avg".parse::<Statistic>(), Ok(Statistic::Avg));
        assert_eq!(Statistic::Std.to_string(), "STD");
        assert!("median".parse::<Statistic>().is_err());
    }
}
