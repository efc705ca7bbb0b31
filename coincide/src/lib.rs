//! Conforming rasters to a common grid.
//!
//! Satellite products rarely agree on extent, and two scenes of the
//! same area may be offset by a fraction of a cell or differ in cell
//! size or projection. This crate snaps rasters onto a reference grid
//! ([align]), cuts them to a polygon ([clip_to_polygon]), masks where
//! two coincident rasters both hold data ([overlap]), snaps whole
//! batches of files ([BatchMatcher]), and computes per-pixel statistics over stacks of
//! coincident rasters ([aggregate], [temporal_fill]).
//!
//! Row 0 of every raster is its top row while grid origins are
//! bottom-left corners; see [georaster] for details.

mod align;
mod batch;
mod error;
mod fill;
mod overlap;
mod resample;
mod stats;

pub use crate::{
    align::{align, check_compatible, clip, clip_to_polygon},
    batch::{
        BatchMatcher, BatchReport, BatchSummary, CancelToken, CandidateReport, FailedCandidate,
        FailurePolicy, MatchOptions, MatchedRaster,
    },
    error::{ErrorKind, MatchError},
    fill::{temporal_fill, FilledSeries, AGE_NODATA},
    overlap::{overlap, overlap_snapped, NO_OVERLAP, OVERLAP},
    resample::{resample, Reproject, Resampler, Resampling},
    stats::{aggregate, RasterStack, Statistic, STATS_NODATA},
};
pub use georaster;
