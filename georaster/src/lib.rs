//! Georeferenced single-band rasters.
//!
//! A [RasterBuffer] is a grid of `f32` samples plus the metadata
//! needed to place it on the ground: the bottom-left corner, the cell
//! size, a NoData sentinel and an opaque projection identifier.
//!
//! # Conventions
//!
//! - Row 0 is the _top_ (northernmost) row of the image.
//! - The origin is the _bottom-left_ corner of the bottom-left cell.
//!
//! Anything that converts between geographic coordinates and row
//! indices must flip Y accordingly.
//!
//! # References
//!
//! 1. [ESRI BIL, BIP and BSQ raster files](https://desktop.arcgis.com/en/arcmap/latest/manage-data/raster-and-images/bil-bip-and-bsq-raster-files.htm)

mod bil;
mod error;
mod nodata;
mod paths;
mod sample;

pub use crate::{
    bil::{BilIo, MetadataWarning, RasterIo, WriteOutcome},
    error::RasterError,
    nodata::{is_nodata, NODATA_REL_TOLERANCE, NODATA_ZERO_EPSILON},
    paths::{is_raster, outname, raster_list, RASTER_EXTENSIONS},
    sample::{Endian, Layout, SampleType},
};
use geo::geometry::{Coord, Rect};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base floating point type used for all coordinates.
pub type C = f64;

/// Opaque coordinate reference system identifier.
///
/// Usually WKT read from a `.prj` sidecar. Two rasters share a
/// projection only if their identifiers are byte-for-byte equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Projection(String);

impl Projection {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the projection of a raster with no spatial reference.
    pub fn unknown() -> Self {
        Self(String::new())
    }

    pub fn is_unknown(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            f.write_str("<unknown>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Real-world size of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSize {
    pub width: C,
    pub height: C,
}

impl CellSize {
    pub fn new(width: C, height: C) -> Result<Self, RasterError> {
        if width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite() {
            Ok(Self { width, height })
        } else {
            Err(RasterError::CellSize { width, height })
        }
    }

    /// Returns `true` if both axes agree with `other` to five
    /// decimal places of their ratio.
    pub fn matches(&self, other: &Self) -> bool {
        ratio_is_unity(self.width, other.width) && ratio_is_unity(self.height, other.height)
    }
}

impl fmt::Display for CellSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn ratio_is_unity(a: C, b: C) -> bool {
    ((a / b) * 1e5).round() / 1e5 == 1.0
}

/// Georeferencing of a raster: where its cells are, and how many.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Bottom-left corner of the bottom-left cell.
    pub origin: Coord<C>,
    pub cell: CellSize,
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    pub projection: Projection,
}

impl Grid {
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn xmax(&self) -> C {
        self.origin.x + self.width as C * self.cell.width
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn ymax(&self) -> C {
        self.origin.y + self.height as C * self.cell.height
    }

    /// Bounding rectangle, derived from origin, size and cell size.
    pub fn rect(&self) -> Rect<C> {
        Rect::new(
            self.origin,
            Coord {
                x: self.xmax(),
                y: self.ymax(),
            },
        )
    }

    /// Returns `true` if cells at the same `(col, row)` in both grids
    /// cover the same ground.
    pub fn is_coincident(&self, other: &Self) -> bool {
        let tol_x = self.cell.width * 1e-6;
        let tol_y = self.cell.height * 1e-6;
        self.width == other.width
            && self.height == other.height
            && self.projection == other.projection
            && self.cell.matches(&other.cell)
            && (self.origin.x - other.origin.x).abs() <= tol_x
            && (self.origin.y - other.origin.y).abs() <= tol_y
    }

    /// Returns the `(col, row)` containing `coord`, which may be out
    /// of bounds.
    #[allow(clippy::cast_possible_truncation)]
    pub fn coord_to_xy(&self, coord: Coord<C>) -> (isize, isize) {
        let col = ((coord.x - self.origin.x) / self.cell.width).floor() as isize;
        let row = ((self.ymax() - coord.y) / self.cell.height).floor() as isize;
        (col, row)
    }

    /// Returns the center of the cell at `(col, row)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn xy_to_coord(&self, (col, row): (usize, usize)) -> Coord<C> {
        Coord {
            x: self.origin.x + (col as C + 0.5) * self.cell.width,
            y: self.ymax() - (row as C + 0.5) * self.cell.height,
        }
    }

    fn xy_to_linear_index(&self, (col, row): (usize, usize)) -> usize {
        row * self.width + col
    }

    fn linear_index_to_xy(&self, idx: usize) -> (usize, usize) {
        (idx % self.width, idx / self.width)
    }
}

/// How to hold samples read from disk.
///
/// Mapping avoids reading a whole file up front, which pays off when
/// only part of a large raster is touched (clipping, for example).
/// Everything a raster produces is held in memory regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Decode every sample into memory.
    #[default]
    InMem,

    /// Memory map file contents and decode on access.
    MemMap,
}

pub(crate) enum SampleStore {
    InMem(Box<[f32]>),
    MemMap {
        raw: Mmap,
        sample_type: SampleType,
        endian: Endian,
        layout: Layout,
        bands: usize,
        /// Bytes preceding the first sample.
        skip: usize,
    },
}

impl SampleStore {
    fn get(&self, grid: &Grid, index: usize) -> f32 {
        match self {
            Self::InMem(samples) => samples[index],
            Self::MemMap {
                raw,
                sample_type,
                endian,
                layout,
                bands,
                skip,
            } => {
                let (col, row) = grid.linear_index_to_xy(index);
                let sample_index =
                    layout.sample_index((*bands, grid.height, grid.width), (0, row, col));
                let start = skip + sample_index * sample_type.size();
                sample_type.decode(*endian, &raw[start..start + sample_type.size()])
            }
        }
    }
}

/// A georeferenced grid of samples.
pub struct RasterBuffer {
    grid: Grid,

    /// Sentinel marking cells without a valid measurement.
    nodata: f32,

    samples: SampleStore,
}

impl RasterBuffer {
    /// Returns a raster holding `samples`, in row-major order with
    /// row 0 at the top.
    pub fn new(grid: Grid, nodata: f32, samples: Vec<f32>) -> Result<Self, RasterError> {
        CellSize::new(grid.cell.width, grid.cell.height)?;
        if samples.len() != grid.len() {
            return Err(RasterError::Dimensions {
                width: grid.width,
                height: grid.height,
                len: samples.len(),
            });
        }
        Ok(Self {
            grid,
            nodata,
            samples: SampleStore::InMem(samples.into_boxed_slice()),
        })
    }

    /// Returns a raster covering `grid` with every cell set to NoData.
    pub fn filled(grid: Grid, nodata: f32) -> Result<Self, RasterError> {
        let samples = vec![nodata; grid.len()];
        Self::new(grid, nodata, samples)
    }

    pub(crate) fn from_store(grid: Grid, nodata: f32, samples: SampleStore) -> Self {
        Self {
            grid,
            nodata,
            samples,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn width(&self) -> usize {
        self.grid.width
    }

    pub fn height(&self) -> usize {
        self.grid.height
    }

    /// Returns the number of cells.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn origin(&self) -> Coord<C> {
        self.grid.origin
    }

    pub fn cell(&self) -> CellSize {
        self.grid.cell
    }

    pub fn nodata(&self) -> f32 {
        self.nodata
    }

    pub fn projection(&self) -> &Projection {
        &self.grid.projection
    }

    pub fn rect(&self) -> Rect<C> {
        self.grid.rect()
    }

    pub fn is_coincident(&self, other: &Self) -> bool {
        self.grid.is_coincident(&other.grid)
    }

    /// Returns `true` if samples are decoded from a mapped file.
    pub fn is_mapped(&self) -> bool {
        matches!(self.samples, SampleStore::MemMap { .. })
    }

    /// Returns `true` if `value` is this raster's NoData.
    pub fn is_nodata(&self, value: f32) -> bool {
        is_nodata(value, self.nodata)
    }

    /// Returns the sample at `(col, row)`.
    ///
    /// # Panics
    ///
    /// Panics if `(col, row)` is out of bounds.
    pub fn get_xy(&self, (col, row): (usize, usize)) -> f32 {
        assert!(col < self.grid.width && row < self.grid.height);
        let idx = self.grid.xy_to_linear_index((col, row));
        self.samples.get(&self.grid, idx)
    }

    /// Returns `true` if the cell at `(col, row)` holds valid data.
    pub fn has_data(&self, xy: (usize, usize)) -> bool {
        !self.is_nodata(self.get_xy(xy))
    }

    /// Returns the sample at the given geo coordinates.
    pub fn get(&self, coord: Coord<C>) -> Option<f32> {
        let (col, row) = self.grid.coord_to_xy(coord);
        let col = usize::try_from(col).ok().filter(|col| *col < self.grid.width)?;
        let row = usize::try_from(row).ok().filter(|row| *row < self.grid.height)?;
        Some(self.get_xy((col, row)))
    }

    /// Returns an iterator over samples in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.len()).map(|idx| self.samples.get(&self.grid, idx))
    }

    /// Returns an iterator over samples that are not NoData.
    pub fn valid(&self) -> impl Iterator<Item = f32> + '_ {
        self.iter().filter(|v| !self.is_nodata(*v))
    }

    /// Returns one row of samples.
    pub fn row(&self, row: usize) -> Vec<f32> {
        (0..self.width()).map(|col| self.get_xy((col, row))).collect()
    }

    pub fn to_vec(&self) -> Vec<f32> {
        match &self.samples {
            SampleStore::InMem(samples) => samples.to_vec(),
            SampleStore::MemMap { .. } => self.iter().collect(),
        }
    }

    /// Returns the lowest and highest valid samples, if any.
    pub fn valid_range(&self) -> Option<(f32, f32)> {
        self.valid().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Declares `nodata` as this raster's sentinel without touching
    /// any sample.
    pub fn define_null(&mut self, nodata: f32) {
        self.nodata = nodata;
    }

    /// Replaces values in a range with NoData.
    ///
    /// With both bounds, values within `[above, below]` are nulled.
    /// With only `above`, values `>= above`; with only `below`,
    /// values `<= below`. Returns the number of cells changed.
    pub fn set_range_null(&mut self, above: Option<f32>, below: Option<f32>) -> usize {
        let nodata = self.nodata;
        let samples = self.samples_mut();
        let mut changed = 0;
        for v in samples.iter_mut() {
            let hit = match (above, below) {
                (Some(above), Some(below)) => above <= *v && *v <= below,
                (Some(above), None) => *v >= above,
                (None, Some(below)) => *v <= below,
                (None, None) => false,
            };
            if hit {
                *v = nodata;
                changed += 1;
            }
        }
        changed
    }

    /// Returns mutable in-memory samples, decoding a mapped file
    /// first if needed.
    fn samples_mut(&mut self) -> &mut [f32] {
        if let SampleStore::MemMap { .. } = self.samples {
            self.samples = SampleStore::InMem(self.to_vec().into_boxed_slice());
        }
        match &mut self.samples {
            SampleStore::InMem(samples) => samples,
            SampleStore::MemMap { .. } => unreachable!("decoded above"),
        }
    }
}

impl Clone for RasterBuffer {
    fn clone(&self) -> Self {
        Self {
            grid: self.grid.clone(),
            nodata: self.nodata,
            samples: SampleStore::InMem(self.to_vec().into_boxed_slice()),
        }
    }
}

impl PartialEq for RasterBuffer {
    /// Rasters are equal if their grids match exactly and every
    /// sample is equal, counting NaN as equal to NaN.
    fn eq(&self, other: &Self) -> bool {
        let same_nodata =
            self.nodata == other.nodata || (self.nodata.is_nan() && other.nodata.is_nan());
        self.grid == other.grid
            && same_nodata
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()))
    }
}

impl fmt::Debug for RasterBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterBuffer")
            .field("grid", &self.grid)
            .field("nodata", &self.nodata)
            .field("mapped", &self.is_mapped())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) fn test_grid(width: usize, height: usize, origin: (C, C), cell: C) -> Grid {
    Grid {
        origin: Coord {
            x: origin.0,
            y: origin.1,
        },
        cell: CellSize {
            width: cell,
            height: cell,
        },
        width,
        height,
        projection: Projection::new("EPSG:32617"),
    }
}
