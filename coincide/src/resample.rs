//! Re-gridding rasters to a new cell size.

use crate::MatchError;
use georaster::{CellSize, Grid, Projection, RasterBuffer, RasterError, C};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Interpolation used when a raster's cell size must change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    Nearest,
    Bilinear,
    /// Catmull-Rom spline over the surrounding 4x4 cells.
    Cubic,
}

impl fmt::Display for Resampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Cubic => "cubic",
        };
        f.write_str(name)
    }
}

impl FromStr for Resampling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            "cubic" => Ok(Self::Cubic),
            other => Err(format!("unknown resampling method {other:?}")),
        }
    }
}

/// Moves a raster into another projection and/or cell size.
///
/// A candidate in a foreign projection is handed to an implementation
/// of this trait before alignment. `method` is `None` when the caller
/// has no resampling policy; implementations must then refuse to
/// change the cell size.
pub trait Reproject: Send + Sync {
    fn reproject(
        &self,
        raster: &RasterBuffer,
        projection: &Projection,
        method: Option<Resampling>,
        cell: CellSize,
    ) -> Result<RasterBuffer, MatchError>;

    /// Whether calls must hold the lock that serializes raster I/O.
    ///
    /// Implementations backed by a toolkit that is not thread safe
    /// keep the default. Returning `false` lets [reproject] run
    /// concurrently with other candidates.
    ///
    /// [reproject]: Reproject::reproject
    fn serialized(&self) -> bool {
        true
    }
}

/// Re-grids rasters within their own projection.
///
/// Asking for a different projection is a
/// [ProjectionMismatch](MatchError::ProjectionMismatch).
#[derive(Debug, Clone, Copy, Default)]
pub struct Resampler;

impl Reproject for Resampler {
    fn reproject(
        &self,
        raster: &RasterBuffer,
        projection: &Projection,
        method: Option<Resampling>,
        cell: CellSize,
    ) -> Result<RasterBuffer, MatchError> {
        if raster.projection() != projection {
            return Err(MatchError::ProjectionMismatch {
                reference: projection.clone(),
                candidate: raster.projection().clone(),
            });
        }
        if raster.cell().matches(&cell) {
            return Ok(raster.clone());
        }
        let method = method.ok_or(MatchError::ResolutionMismatch {
            reference: cell,
            candidate: raster.cell(),
        })?;
        Ok(resample(raster, cell, method)?)
    }

    fn serialized(&self) -> bool {
        false
    }
}

/// Returns `raster` re-gridded to `cell`.
///
/// The bottom-left corner is kept and the extent is rounded to a
/// whole number of new cells. Each output cell takes the value
/// interpolated at its center. NoData never leaks into interpolated
/// values: cubic falls back to bilinear, and bilinear to nearest,
/// when a needed neighbor is NoData.
pub fn resample(
    raster: &RasterBuffer,
    cell: CellSize,
    method: Resampling,
) -> Result<RasterBuffer, RasterError> {
    let cell = CellSize::new(cell.width, cell.height)?;
    let src = raster.grid();
    let grid = Grid {
        origin: src.origin,
        cell,
        width: cells_along(src.xmax() - src.origin.x, cell.width, src.width),
        height: cells_along(src.ymax() - src.origin.y, cell.height, src.height),
        projection: src.projection.clone(),
    };
    debug!(
        "resampling {}x{} to {}x{} ({method})",
        src.width, src.height, grid.width, grid.height
    );

    let nodata = raster.nodata();
    let source = Source {
        grid: src,
        data: raster
            .iter()
            .map(|v| if raster.is_nodata(v) { f32::NAN } else { v })
            .collect(),
    };

    let mut samples = vec![nodata; grid.len()];
    if grid.width > 0 {
        samples
            .par_chunks_mut(grid.width)
            .enumerate()
            .for_each(|(row, out)| {
                for (col, sample) in out.iter_mut().enumerate() {
                    let value = source.sample(grid.xy_to_coord((col, row)), method);
                    if !value.is_nan() {
                        *sample = value;
                    }
                }
            });
    }

    RasterBuffer::new(grid, nodata, samples)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn cells_along(extent: C, cell: C, source_cells: usize) -> usize {
    if source_cells == 0 {
        0
    } else {
        ((extent / cell).round() as usize).max(1)
    }
}

/// Source samples with NoData replaced by NaN.
struct Source<'a> {
    grid: &'a Grid,
    data: Vec<f32>,
}

impl Source<'_> {
    fn sample(&self, coord: geo::Coord<C>, method: Resampling) -> f32 {
        let (col, row) = self.grid.coord_to_xy(coord);
        let inside = usize::try_from(col).map_or(false, |col| col < self.grid.width)
            && usize::try_from(row).map_or(false, |row| row < self.grid.height);
        if !inside {
            return f32::NAN;
        }
        // Fractional position in cell-center index space.
        let x = (coord.x - self.grid.origin.x) / self.grid.cell.width - 0.5;
        let y = (self.grid.ymax() - coord.y) / self.grid.cell.height - 0.5;
        #[allow(clippy::cast_precision_loss)]
        let (x, y) = (
            x.clamp(0.0, (self.grid.width - 1) as C),
            y.clamp(0.0, (self.grid.height - 1) as C),
        );
        match method {
            Resampling::Nearest => self.nearest(x, y),
            Resampling::Bilinear => self.bilinear(x, y),
            Resampling::Cubic => self.cubic(x, y),
        }
    }

    fn at(&self, col: usize, row: usize) -> f32 {
        self.data[row * self.grid.width + col]
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn nearest(&self, x: C, y: C) -> f32 {
        self.at(x.round() as usize, y.round() as usize)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn bilinear(&self, x: C, y: C) -> f32 {
        let (x0, y0) = (x.floor() as usize, y.floor() as usize);
        let x1 = (x0 + 1).min(self.grid.width - 1);
        let y1 = (y0 + 1).min(self.grid.height - 1);
        let v00 = self.at(x0, y0);
        let v10 = self.at(x1, y0);
        let v01 = self.at(x0, y1);
        let v11 = self.at(x1, y1);
        if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
            return self.nearest(x, y);
        }
        #[allow(clippy::cast_precision_loss)]
        let (xf, yf) = ((x - x0 as C) as f32, (y - y0 as C) as f32);
        let top = v00 * (1.0 - xf) + v10 * xf;
        let bottom = v01 * (1.0 - xf) + v11 * xf;
        top * (1.0 - yf) + bottom * yf
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn cubic(&self, x: C, y: C) -> f32 {
        let (xi, yi) = (x.floor() as isize, y.floor() as isize);
        let (xf, yf) = ((x - xi as C) as f32, (y - yi as C) as f32);
        let (max_col, max_row) = (self.grid.width as isize - 1, self.grid.height as isize - 1);

        let mut rows = [0.0f32; 4];
        for (j, row_value) in rows.iter_mut().enumerate() {
            let row = (yi + j as isize - 1).clamp(0, max_row) as usize;
            let mut p = [0.0f32; 4];
            for (i, v) in p.iter_mut().enumerate() {
                let col = (xi + i as isize - 1).clamp(0, max_col) as usize;
                *v = self.at(col, row);
                if v.is_nan() {
                    return self.bilinear(x, y);
                }
            }
            *row_value = catmull_rom(p, xf);
        }
        catmull_rom(rows, yf)
    }
}

fn catmull_rom([p0, p1, p2, p3]: [f32; 4], t: f32) -> f32 {
    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    ((a * t + b) * t + c) * t + p1
}
