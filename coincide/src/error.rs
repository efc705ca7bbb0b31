use georaster::{CellSize, Projection, RasterError};
use serde::Serialize;
use std::{path::PathBuf, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("not a raster {0}")]
    NotARaster(PathBuf),

    #[error("projection {candidate} does not match reference projection {reference}")]
    ProjectionMismatch {
        reference: Projection,
        candidate: Projection,
    },

    #[error("cell size {candidate} does not match reference cell size {reference}, choose a resampling method")]
    ResolutionMismatch {
        reference: CellSize,
        candidate: CellSize,
    },

    #[error("{width}x{height} candidate still exceeds {reference_width}x{reference_height} reference after clipping")]
    AlignmentOverflow {
        width: usize,
        height: usize,
        reference_width: usize,
        reference_height: usize,
    },

    #[error("rasters are not coincident")]
    NotCoincident,

    #[error("no rasters to stack")]
    EmptyStack,

    #[error("{0}")]
    Io(RasterError),

    #[error("cancelled")]
    Cancelled,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<RasterError> for MatchError {
    fn from(err: RasterError) -> Self {
        match err {
            RasterError::NotARaster(path) | RasterError::UnsupportedFormat(path) => {
                Self::NotARaster(path)
            }
            other => Self::Io(other),
        }
    }
}

impl From<std::io::Error> for MatchError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(RasterError::Io(err))
    }
}

/// Stable label for each [MatchError] variant, used in batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NotARaster,
    ProjectionMismatch,
    ResolutionMismatch,
    AlignmentOverflow,
    NotCoincident,
    EmptyStack,
    #[serde(rename = "IOFailure")]
    IoFailure,
    Cancelled,
    Timeout,
}

impl MatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotARaster(_) => ErrorKind::NotARaster,
            Self::ProjectionMismatch { .. } => ErrorKind::ProjectionMismatch,
            Self::ResolutionMismatch { .. } => ErrorKind::ResolutionMismatch,
            Self::AlignmentOverflow { .. } => ErrorKind::AlignmentOverflow,
            Self::NotCoincident => ErrorKind::NotCoincident,
            Self::EmptyStack => ErrorKind::EmptyStack,
            Self::Io(_) | Self::ThreadPool(_) => ErrorKind::IoFailure,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }
}
