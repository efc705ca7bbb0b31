//! On-disk sample encodings.

use crate::RasterError;
use byteorder::{BigEndian as BE, ByteOrder, LittleEndian as LE, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::{fmt, io::Write, str::FromStr};

/// Numeric type of a raster sample as stored on disk.
///
/// Names follow the usual array-library spelling (`uint8`,
/// `float32`, ...) so they can be passed straight through from the
/// command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Float32,
    Float64,
}

impl SampleType {
    /// Bytes per sample.
    pub fn size(self) -> usize {
        match self {
            Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Int16 => 2,
            Self::Uint32 | Self::Int32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// ESRI header `PIXELTYPE` and `NBITS` for this type.
    pub(crate) fn to_header(self) -> (&'static str, usize) {
        let kind = match self {
            Self::Uint8 | Self::Uint16 | Self::Uint32 => "UNSIGNEDINT",
            Self::Int8 | Self::Int16 | Self::Int32 => "SIGNEDINT",
            Self::Float32 | Self::Float64 => "FLOAT",
        };
        (kind, self.size() * 8)
    }

    pub(crate) fn from_header(pixel_type: &str, nbits: usize) -> Option<Self> {
        let sample_type = match (pixel_type.to_ascii_uppercase().as_str(), nbits) {
            ("UNSIGNEDINT", 8) => Self::Uint8,
            ("SIGNEDINT", 8) => Self::Int8,
            ("UNSIGNEDINT", 16) => Self::Uint16,
            ("SIGNEDINT", 16) => Self::Int16,
            ("UNSIGNEDINT", 32) => Self::Uint32,
            ("SIGNEDINT", 32) => Self::Int32,
            ("FLOAT", 32) => Self::Float32,
            ("FLOAT", 64) => Self::Float64,
            _ => return None,
        };
        Some(sample_type)
    }

    /// Decodes one sample from the front of `bytes`.
    ///
    /// `bytes` must hold at least [`SampleType::size`] bytes.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub(crate) fn decode(self, endian: Endian, bytes: &[u8]) -> f32 {
        fn dec<B: ByteOrder>(sample_type: SampleType, bytes: &[u8]) -> f32 {
            match sample_type {
                SampleType::Uint8 => f32::from(bytes[0]),
                SampleType::Int8 => f32::from(bytes[0] as i8),
                SampleType::Uint16 => f32::from(B::read_u16(bytes)),
                SampleType::Int16 => f32::from(B::read_i16(bytes)),
                SampleType::Uint32 => B::read_u32(bytes) as f32,
                SampleType::Int32 => B::read_i32(bytes) as f32,
                SampleType::Float32 => B::read_f32(bytes),
                SampleType::Float64 => B::read_f64(bytes) as f32,
            }
        }
        match endian {
            Endian::Big => dec::<BE>(self, bytes),
            Endian::Little => dec::<LE>(self, bytes),
        }
    }

    /// Encodes `value` into `wtr`.
    ///
    /// Integer types round to the nearest integer and reject values
    /// outside their range, NaN included.
    pub(crate) fn encode<W: Write>(
        self,
        endian: Endian,
        wtr: &mut W,
        value: f32,
    ) -> Result<(), RasterError> {
        fn int<T: num_traits::NumCast>(
            value: f32,
            sample_type: SampleType,
        ) -> Result<T, RasterError> {
            T::from(value.round())
                .ok_or(RasterError::SampleRange { value, sample_type })
        }
        fn enc<B: ByteOrder, W: Write>(
            sample_type: SampleType,
            wtr: &mut W,
            value: f32,
        ) -> Result<(), RasterError> {
            match sample_type {
                SampleType::Uint8 => wtr.write_u8(int(value, sample_type)?)?,
                SampleType::Int8 => wtr.write_i8(int(value, sample_type)?)?,
                SampleType::Uint16 => wtr.write_u16::<B>(int(value, sample_type)?)?,
                SampleType::Int16 => wtr.write_i16::<B>(int(value, sample_type)?)?,
                SampleType::Uint32 => wtr.write_u32::<B>(int(value, sample_type)?)?,
                SampleType::Int32 => wtr.write_i32::<B>(int(value, sample_type)?)?,
                SampleType::Float32 => wtr.write_f32::<B>(value)?,
                SampleType::Float64 => wtr.write_f64::<B>(f64::from(value))?,
            };
            Ok(())
        }
        match endian {
            Endian::Big => enc::<BE, W>(self, wtr, value),
            Endian::Little => enc::<LE, W>(self, wtr, value),
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uint8 => "uint8",
            Self::Int8 => "int8",
            Self::Uint16 => "uint16",
            Self::Int16 => "int16",
            Self::Uint32 => "uint32",
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        };
        f.write_str(name)
    }
}

impl FromStr for SampleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uint8" => Ok(Self::Uint8),
            "int8" => Ok(Self::Int8),
            "uint16" => Ok(Self::Uint16),
            "int16" => Ok(Self::Int16),
            "uint32" => Ok(Self::Uint32),
            "int32" => Ok(Self::Int32),
            "float32" => Ok(Self::Float32),
            "float64" => Ok(Self::Float64),
            other => Err(format!("unknown sample type {other}")),
        }
    }
}

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Motorola (`BYTEORDER M`).
    Big,
    /// Intel (`BYTEORDER I`).
    Little,
}

/// Band interleaving of a raw raster file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Band interleaved by line.
    Bil,
    /// Band interleaved by pixel.
    Bip,
    /// Band sequential.
    Bsq,
}

impl Layout {
    /// Sample index of `(band, row, col)` in a file of `bands` bands,
    /// each `rows` by `cols`.
    pub(crate) fn sample_index(
        self,
        (bands, rows, cols): (usize, usize, usize),
        (band, row, col): (usize, usize, usize),
    ) -> usize {
        match self {
            Self::Bsq => (band * rows + row) * cols + col,
            Self::Bil => (row * bands + band) * cols + col,
            Self::Bip => (row * cols + col) * bands + band,
        }
    }
}
