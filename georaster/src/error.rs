use crate::SampleType;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("not a raster file {0}")]
    NotARaster(PathBuf),

    #[error("unsupported raster format {0}")]
    UnsupportedFormat(PathBuf),

    #[error("invalid raster header {path}: {reason}")]
    Header { path: PathBuf, reason: String },

    #[error("invalid raster file len {actual} for {path}, expected {expected}")]
    Len {
        expected: u64,
        actual: u64,
        path: PathBuf,
    },

    #[error("{len} samples do not fill a {width}x{height} grid")]
    Dimensions {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error("cell size must be positive, got {width}x{height}")]
    CellSize { width: f64, height: f64 },

    #[error("value {value} is not representable as {sample_type}")]
    SampleRange { value: f32, sample_type: SampleType },
}
