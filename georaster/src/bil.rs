//! ESRI band-interleaved rasters (`.bil`, `.bip`, `.bsq`).
//!
//! A raster is stored as three files sharing a stem:
//!
//! - `<stem>.<ext>`: raw samples, no header.
//! - `<stem>.hdr`: `KEY value` text lines describing the samples.
//! - `<stem>.prj`: optional projection text.
//!
//! Only the first band of multi-band files is read.

use crate::{
    paths::has_raster_extension, CellSize, Endian, Grid, Layout, LoadMode, Projection,
    RasterBuffer, RasterError, SampleStore, SampleType, C,
};
use geo::geometry::Coord;
use log::debug;
use memmap2::Mmap;
use std::{
    ffi::OsStr,
    fmt,
    fs::{self, File},
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};

/// Raster persistence.
///
/// Alignment and statistics only ever see [RasterBuffer]s; where
/// they come from and go to is up to the implementor.
pub trait RasterIo: Send + Sync {
    /// Reads pixel data and georeferencing from `path`.
    fn read(&self, path: &Path) -> Result<RasterBuffer, RasterError>;

    /// Writes `raster` to `path`, converting samples to `sample_type`.
    fn write(
        &self,
        raster: &RasterBuffer,
        path: &Path,
        sample_type: SampleType,
    ) -> Result<WriteOutcome, RasterError>;

    /// Returns every file [RasterIo::write] produces for `path`,
    /// with `path` itself first.
    fn files(&self, path: &Path) -> Vec<PathBuf> {
        vec![path.to_owned()]
    }
}

/// Result of a write whose samples made it to disk.
#[must_use]
#[derive(Debug)]
pub enum WriteOutcome {
    /// Samples and all metadata were written.
    Complete,

    /// Samples were written, but some metadata was not.
    Degraded(Vec<MetadataWarning>),
}

impl WriteOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn warnings(&self) -> &[MetadataWarning] {
        match self {
            Self::Complete => &[],
            Self::Degraded(warnings) => warnings,
        }
    }
}

/// A metadata file that could not be written.
#[derive(Debug)]
pub struct MetadataWarning {
    pub path: PathBuf,
    pub error: std::io::Error,
}

impl fmt::Display for MetadataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to write {}: {}", self.path.display(), self.error)
    }
}

/// Reads and writes ESRI band-interleaved rasters.
#[derive(Debug, Clone, Copy, Default)]
pub struct BilIo {
    mode: LoadMode,
}

impl BilIo {
    pub fn new(mode: LoadMode) -> Self {
        Self { mode }
    }

    pub fn header_path(path: &Path) -> PathBuf {
        path.with_extension("hdr")
    }

    pub fn projection_path(path: &Path) -> PathBuf {
        path.with_extension("prj")
    }

    /// Declares `nodata` as the NoData value of the raster at `path`
    /// by rewriting its header. Samples are untouched.
    pub fn define_null(&self, path: &Path, nodata: f32) -> Result<(), RasterError> {
        let hdr_path = Self::header_path(path);
        let mut header = Header::parse(&hdr_path, &fs::read_to_string(&hdr_path)?)?;
        header.nodata = Some(nodata);
        fs::write(&hdr_path, header.to_string())?;
        debug!("set NoData {nodata} in {hdr_path:?}");
        Ok(())
    }
}

impl RasterIo for BilIo {
    fn read(&self, path: &Path) -> Result<RasterBuffer, RasterError> {
        if !crate::is_raster(path) {
            return Err(RasterError::NotARaster(path.to_owned()));
        }
        if !is_band_interleaved(path) {
            return Err(RasterError::UnsupportedFormat(path.to_owned()));
        }

        let hdr_path = Self::header_path(path);
        let header_text = match fs::read_to_string(&hdr_path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RasterError::Header {
                    path: hdr_path,
                    reason: "missing header".into(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let header = Header::parse(&hdr_path, &header_text)?;
        let projection = match fs::read_to_string(Self::projection_path(path)) {
            Ok(text) => Projection::new(text.trim()),
            Err(e) if e.kind() == ErrorKind::NotFound => Projection::unknown(),
            Err(e) => return Err(e.into()),
        };
        let grid = header.grid(projection)?;
        let nodata = header.nodata.unwrap_or(f32::NAN);

        let expected = header.file_len().ok_or_else(|| RasterError::Header {
            path: hdr_path.clone(),
            reason: "dimensions overflow".into(),
        })?;
        let actual = path.metadata()?.len();
        if actual != expected {
            return Err(RasterError::Len {
                expected,
                actual,
                path: path.to_owned(),
            });
        }

        debug!("loading {path:?} ({:?})", self.mode);
        let samples = match self.mode {
            LoadMode::InMem => {
                let raw = fs::read(path)?;
                SampleStore::InMem(header.decode(&raw).into_boxed_slice())
            }
            LoadMode::MemMap => {
                let file = File::open(path)?;
                let raw = unsafe { Mmap::map(&file)? };
                SampleStore::MemMap {
                    raw,
                    sample_type: header.sample_type,
                    endian: header.endian,
                    layout: header.layout,
                    bands: header.bands,
                    skip: header.skip,
                }
            }
        };
        Ok(RasterBuffer::from_store(grid, nodata, samples))
    }

    fn write(
        &self,
        raster: &RasterBuffer,
        path: &Path,
        sample_type: SampleType,
    ) -> Result<WriteOutcome, RasterError> {
        if !is_band_interleaved(path) {
            return Err(RasterError::UnsupportedFormat(path.to_owned()));
        }
        let header = Header::for_raster(raster, sample_type, layout_for(path));

        {
            let mut wtr = BufWriter::new(File::create(path)?);
            for value in raster.iter() {
                sample_type.encode(header.endian, &mut wtr, value)?;
            }
            wtr.flush()?;
        }
        fs::write(Self::header_path(path), header.to_string())?;

        let mut warnings = Vec::new();
        if !raster.projection().is_unknown() {
            let prj_path = Self::projection_path(path);
            if let Err(error) = fs::write(&prj_path, raster.projection().as_str()) {
                warnings.push(MetadataWarning {
                    path: prj_path,
                    error,
                });
            }
        }

        debug!("wrote {path:?} as {sample_type}");
        if warnings.is_empty() {
            Ok(WriteOutcome::Complete)
        } else {
            Ok(WriteOutcome::Degraded(warnings))
        }
    }

    fn files(&self, path: &Path) -> Vec<PathBuf> {
        vec![
            path.to_owned(),
            Self::header_path(path),
            Self::projection_path(path),
        ]
    }
}

/// Returns `true` for extensions holding raw interleaved samples.
fn is_band_interleaved(path: &Path) -> bool {
    has_raster_extension(path)
        && path
            .extension()
            .and_then(OsStr::to_str)
            .map_or(false, |ext| {
                ["bil", "bip", "bsq", "dat", "img"]
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
}

fn layout_for(path: &Path) -> Layout {
    match path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("bip") => Layout::Bip,
        Some("bsq") => Layout::Bsq,
        _ => Layout::Bil,
    }
}

/// Parsed `.hdr` contents.
#[derive(Debug, Clone, PartialEq)]
struct Header {
    rows: usize,
    cols: usize,
    bands: usize,
    sample_type: SampleType,
    endian: Endian,
    layout: Layout,
    skip: usize,
    /// Center of the upper-left cell.
    ulxmap: C,
    ulymap: C,
    xdim: C,
    ydim: C,
    nodata: Option<f32>,
}

impl Header {
    fn parse(path: &Path, text: &str) -> Result<Self, RasterError> {
        let mk_err = |reason: String| RasterError::Header {
            path: path.to_owned(),
            reason,
        };

        let mut rows = None;
        let mut cols = None;
        let mut bands = 1;
        let mut nbits = 8;
        let mut pixel_type = String::from("UNSIGNEDINT");
        let mut endian = Endian::Little;
        let mut layout = Layout::Bil;
        let mut skip = 0;
        let mut ulxmap = None;
        let mut ulymap = None;
        let mut xdim = 1.0;
        let mut ydim = 1.0;
        let mut nodata = None;

        for line in text.lines() {
            let mut fields = line.split_whitespace();
            let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
                continue;
            };
            let bad = || mk_err(format!("invalid {key} {value}"));
            match key.to_ascii_uppercase().as_str() {
                "NROWS" => rows = Some(value.parse::<usize>().map_err(|_| bad())?),
                "NCOLS" => cols = Some(value.parse::<usize>().map_err(|_| bad())?),
                "NBANDS" => bands = value.parse::<usize>().map_err(|_| bad())?,
                "NBITS" => nbits = value.parse::<usize>().map_err(|_| bad())?,
                "SKIPBYTES" => skip = value.parse::<usize>().map_err(|_| bad())?,
                "PIXELTYPE" => pixel_type = value.to_owned(),
                "BYTEORDER" => {
                    endian = match value.to_ascii_uppercase().as_str() {
                        "I" | "LSBFIRST" => Endian::Little,
                        "M" | "MSBFIRST" => Endian::Big,
                        _ => return Err(mk_err(format!("invalid BYTEORDER {value}"))),
                    }
                }
                "LAYOUT" | "INTERLEAVING" => {
                    layout = match value.to_ascii_uppercase().as_str() {
                        "BIL" => Layout::Bil,
                        "BIP" => Layout::Bip,
                        "BSQ" => Layout::Bsq,
                        _ => return Err(mk_err(format!("invalid LAYOUT {value}"))),
                    }
                }
                "ULXMAP" => ulxmap = Some(value.parse::<C>().map_err(|_| bad())?),
                "ULYMAP" => ulymap = Some(value.parse::<C>().map_err(|_| bad())?),
                "XDIM" => xdim = value.parse::<C>().map_err(|_| bad())?,
                "YDIM" => ydim = value.parse::<C>().map_err(|_| bad())?,
                "NODATA" | "NODATA_VALUE" => {
                    nodata = Some(value.parse::<f32>().map_err(|_| bad())?);
                }
                _ => {}
            }
        }

        let rows = rows.ok_or_else(|| mk_err("missing NROWS".into()))?;
        let cols = cols.ok_or_else(|| mk_err("missing NCOLS".into()))?;
        if bands == 0 {
            return Err(mk_err("NBANDS must be at least 1".into()));
        }
        let sample_type = SampleType::from_header(&pixel_type, nbits)
            .ok_or_else(|| mk_err(format!("unsupported PIXELTYPE {pixel_type} NBITS {nbits}")))?;
        #[allow(clippy::cast_precision_loss)]
        let ulymap = ulymap.unwrap_or((rows.saturating_sub(1)) as C * ydim);

        let header = Self {
            rows,
            cols,
            bands,
            sample_type,
            endian,
            layout,
            skip,
            ulxmap: ulxmap.unwrap_or(0.0),
            ulymap,
            xdim,
            ydim,
            nodata,
        };
        if header.file_len().is_none() {
            return Err(mk_err("dimensions overflow".into()));
        }
        Ok(header)
    }

    fn for_raster(raster: &RasterBuffer, sample_type: SampleType, layout: Layout) -> Self {
        let grid = raster.grid();
        let nodata = if sample_type.is_float() {
            raster.nodata()
        } else {
            raster.nodata().round()
        };
        Self {
            rows: grid.height,
            cols: grid.width,
            bands: 1,
            sample_type,
            endian: Endian::Little,
            layout,
            skip: 0,
            ulxmap: grid.origin.x + grid.cell.width / 2.0,
            ulymap: grid.ymax() - grid.cell.height / 2.0,
            xdim: grid.cell.width,
            ydim: grid.cell.height,
            nodata: Some(nodata),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn grid(&self, projection: Projection) -> Result<Grid, RasterError> {
        let cell = CellSize::new(self.xdim, self.ydim)?;
        let origin = Coord {
            x: self.ulxmap - self.xdim / 2.0,
            y: self.ulymap + self.ydim / 2.0 - self.rows as C * self.ydim,
        };
        Ok(Grid {
            origin,
            cell,
            width: self.cols,
            height: self.rows,
            projection,
        })
    }

    /// Expected size of the data file in bytes, `None` if the
    /// dimensions overflow.
    fn file_len(&self) -> Option<u64> {
        let len = self
            .rows
            .checked_mul(self.cols)?
            .checked_mul(self.bands)?
            .checked_mul(self.sample_type.size())?
            .checked_add(self.skip)?;
        u64::try_from(len).ok()
    }

    /// Decodes the first band of `raw` into row-major samples.
    fn decode(&self, raw: &[u8]) -> Vec<f32> {
        let size = self.sample_type.size();
        let dims = (self.bands, self.rows, self.cols);
        let mut samples = Vec::with_capacity(self.rows * self.cols);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let start = self.skip + self.layout.sample_index(dims, (0, row, col)) * size;
                samples.push(self.sample_type.decode(self.endian, &raw[start..start + size]));
            }
        }
        samples
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (pixel_type, nbits) = self.sample_type.to_header();
        let byte_order = match self.endian {
            Endian::Big => "M",
            Endian::Little => "I",
        };
        let layout = match self.layout {
            Layout::Bil => "BIL",
            Layout::Bip => "BIP",
            Layout::Bsq => "BSQ",
        };
        let row_bytes = self.cols * self.sample_type.size();
        writeln!(f, "BYTEORDER      {byte_order}")?;
        writeln!(f, "LAYOUT         {layout}")?;
        writeln!(f, "NROWS          {}", self.rows)?;
        writeln!(f, "NCOLS          {}", self.cols)?;
        writeln!(f, "NBANDS         {}", self.bands)?;
        writeln!(f, "NBITS          {nbits}")?;
        writeln!(f, "PIXELTYPE      {pixel_type}")?;
        writeln!(f, "BANDROWBYTES   {row_bytes}")?;
        writeln!(f, "TOTALROWBYTES  {}", row_bytes * self.bands)?;
        if self.skip > 0 {
            writeln!(f, "SKIPBYTES      {}", self.skip)?;
        }
        writeln!(f, "ULXMAP         {}", self.ulxmap)?;
        writeln!(f, "ULYMAP         {}", self.ulymap)?;
        writeln!(f, "XDIM           {}", self.xdim)?;
        writeln!(f, "YDIM           {}", self.ydim)?;
        if let Some(nodata) = self.nodata {
            writeln!(f, "NODATA         {nodata}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BilIo, Header, Layout, RasterIo};
    use crate::{
        test_grid, Endian, LoadMode, Projection, RasterBuffer, RasterError, SampleType,
    };
    use byteorder::{BigEndian as BE, WriteBytesExt};
    use std::{fs, path::Path};

    fn ramp() -> RasterBuffer {
        let grid = test_grid(4, 3, (500.0, 1000.0), 30.0);
        let samples = (0..12).map(|v| v as f32).collect();
        RasterBuffer::new(grid, -9999.0, samples).unwrap()
    }

    #[test]
    fn test_write_then_read_both_modes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.bil");
        let raster = ramp();
        let outcome = BilIo::default()
            .write(&raster, &path, SampleType::Int16)
            .unwrap();
        assert!(outcome.is_complete());
        assert_eq!(fs::metadata(&path).unwrap().len(), 12 * 2);

        for mode in [LoadMode::InMem, LoadMode::MemMap] {
            let loaded = BilIo::new(mode).read(&path).unwrap();
            assert_eq!(loaded.is_mapped(), mode == LoadMode::MemMap);
            assert_eq!(loaded, raster);
        }
    }

    #[test]
    fn test_unknown_projection_has_no_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.bsq");
        let mut grid = test_grid(1, 1, (0.0, 0.0), 1.0);
        grid.projection = Projection::unknown();
        let raster = RasterBuffer::new(grid, 0.0, vec![7.0]).unwrap();
        BilIo::default()
            .write(&raster, &path, SampleType::Float32)
            .unwrap();
        assert!(!BilIo::projection_path(&path).exists());
        let loaded = BilIo::default().read(&path).unwrap();
        assert!(loaded.projection().is_unknown());
    }

    #[test]
    fn test_projection_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.bil");
        // A directory squatting on the sidecar name makes the write fail.
        fs::create_dir(BilIo::projection_path(&path)).unwrap();
        let outcome = BilIo::default()
            .write(&ramp(), &path, SampleType::Float32)
            .unwrap();
        assert_eq!(outcome.warnings().len(), 1);
        assert!(path.exists());
    }

    #[test]
    fn test_reads_big_endian_multiband_bip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pair.bip");
        // 2 bands, 1 row, 2 cols: (b0, b1) per pixel.
        let mut raw = Vec::new();
        for v in [1_i16, 100, 2, 200] {
            raw.write_i16::<BE>(v).unwrap();
        }
        fs::write(&path, raw).unwrap();
        fs::write(
            BilIo::header_path(&path),
            "byteorder M\nlayout BIP\nnrows 1\nncols 2\nnbands 2\nnbits 16\n\
             pixeltype SIGNEDINT\nulxmap 0.5\nulymap 0.5\nxdim 1\nydim 1\nnodata -1\n",
        )
        .unwrap();
        for mode in [LoadMode::InMem, LoadMode::MemMap] {
            let raster = BilIo::new(mode).read(&path).unwrap();
            assert_eq!(raster.to_vec(), vec![1.0, 2.0]);
            assert_eq!(raster.nodata(), -1.0);
            assert_eq!(raster.origin().x, 0.0);
            assert_eq!(raster.origin().y, 0.0);
        }
    }

    #[test]
    fn test_wrong_len() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bil");
        fs::write(&path, [0_u8; 3]).unwrap();
        fs::write(BilIo::header_path(&path), "NROWS 2\nNCOLS 2\n").unwrap();
        let err = BilIo::default().read(&path).unwrap_err();
        assert!(matches!(
            err,
            RasterError::Len {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_not_a_raster() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.bil");
        assert!(matches!(
            BilIo::default().read(&missing),
            Err(RasterError::NotARaster(_))
        ));
        let text = dir.path().join("notes.txt");
        fs::write(&text, "hi").unwrap();
        assert!(matches!(
            BilIo::default().read(&text),
            Err(RasterError::NotARaster(_))
        ));
        let tif = dir.path().join("scene.tif");
        fs::write(&tif, "II*").unwrap();
        assert!(matches!(
            BilIo::default().read(&tif),
            Err(RasterError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orphan.bil");
        fs::write(&path, [0_u8; 4]).unwrap();
        assert!(matches!(
            BilIo::default().read(&path),
            Err(RasterError::Header { .. })
        ));
    }

    #[test]
    fn test_define_null_rewrites_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.bil");
        let io = BilIo::default();
        io.write(&ramp(), &path, SampleType::Float32).unwrap();
        let before = fs::read(&path).unwrap();
        io.define_null(&path, 0.0).unwrap();
        assert_eq!(fs::read(&path).unwrap(), before);
        let loaded = io.read(&path).unwrap();
        assert_eq!(loaded.nodata(), 0.0);
        assert_eq!(loaded.valid().count(), 11);
    }

    #[test]
    fn test_header_defaults_and_errors() {
        let path = Path::new("x.hdr");
        let header = Header::parse(path, "NROWS 3\nNCOLS 2\n").unwrap();
        assert_eq!(header.sample_type, SampleType::Uint8);
        assert_eq!(header.endian, Endian::Little);
        assert_eq!(header.layout, Layout::Bil);
        assert_eq!(header.nodata, None);
        assert_eq!(header.ulymap, 2.0);

        assert!(Header::parse(path, "NCOLS 2\n").is_err());
        assert!(Header::parse(path, "NROWS 1\nNCOLS 1\nNBITS 12\n").is_err());
        assert!(Header::parse(path, "NROWS x\nNCOLS 1\n").is_err());
        assert!(Header::parse(path, "NROWS 1\nNCOLS 1\nBYTEORDER Q\n").is_err());
    }

    #[test]
    fn test_files_lists_data_first() {
        let files = BilIo::default().files(Path::new("dir/a.bil"));
        assert_eq!(
            files,
            vec![
                Path::new("dir/a.bil").to_owned(),
                Path::new("dir/a.hdr").to_owned(),
                Path::new("dir/a.prj").to_owned(),
            ]
        );
    }

    #[test]
    fn test_huge_dimensions_are_header_errors() {
        let path = Path::new("x.hdr");
        let err = Header::parse(path, "NROWS 18446744073709551615\nNCOLS 4\n").unwrap_err();
        assert!(
            matches!(err, RasterError::Header { ref reason, .. } if reason == "dimensions overflow")
        );
        let skip = format!("NROWS 1\nNCOLS 1\nSKIPBYTES {}\n", usize::MAX);
        assert!(Header::parse(path, &skip).is_err());

        // Surfaces through `read` like any other bad header.
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("huge.bil");
        fs::write(&data, [0_u8; 4]).unwrap();
        fs::write(
            BilIo::header_path(&data),
            "NROWS 18446744073709551615\nNCOLS 4\n",
        )
        .unwrap();
        let err = BilIo::default().read(&data).unwrap_err();
        assert!(matches!(err, RasterError::Header { .. }));
    }

    #[test]
    fn test_integer_output_rejects_nan_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nan.bil");
        let grid = test_grid(2, 1, (0.0, 0.0), 1.0);
        let raster = RasterBuffer::new(grid, f32::NAN, vec![1.0, f32::NAN]).unwrap();
        let err = BilIo::default()
            .write(&raster, &path, SampleType::Uint8)
            .unwrap_err();
        assert!(matches!(err, RasterError::SampleRange { .. }));
    }
}
