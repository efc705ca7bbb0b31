//! Raster file names.

use std::{
    ffi::OsStr,
    fs,
    io,
    path::{Path, PathBuf},
};

/// File extensions recognized as rasters, compared case-insensitively.
pub const RASTER_EXTENSIONS: [&str; 11] = [
    "bil", "bip", "bmp", "bsq", "dat", "gif", "img", "jpg", "jp2", "png", "tif",
];

/// Returns `true` if `path` is an existing file with a raster extension.
pub fn is_raster<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    path.is_file() && has_raster_extension(path)
}

pub(crate) fn has_raster_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map_or(false, |ext| {
            RASTER_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Expands `inputs` into a sorted list of raster files.
///
/// Directories contribute their immediate raster children; anything
/// that is not an existing raster file is dropped.
pub fn raster_list<P: AsRef<Path>>(inputs: &[P]) -> io::Result<Vec<PathBuf>> {
    let mut rasters = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            for entry in fs::read_dir(input)? {
                let path = entry?.path();
                if is_raster(&path) {
                    rasters.push(path);
                }
            }
        } else if is_raster(input) {
            rasters.push(input.to_owned());
        }
    }
    rasters.sort();
    rasters.dedup();
    Ok(rasters)
}

/// Returns an output path derived from `input`.
///
/// The result is `<dir>/<stem>_<suffix>.<ext>`, where `dir` is
/// `out_dir` or, failing that, the directory of `input`, and `ext` is
/// `ext` (leading dots ignored) or, failing that, the extension of
/// `input`.
pub fn outname(out_dir: Option<&Path>, input: &Path, suffix: &str, ext: Option<&str>) -> PathBuf {
    let stem = input.file_stem().and_then(OsStr::to_str).unwrap_or_default();
    let ext = ext
        .map(|ext| ext.trim_start_matches('.').to_owned())
        .or_else(|| {
            input
                .extension()
                .and_then(OsStr::to_str)
                .map(str::to_owned)
        });
    let file_name = match ext {
        Some(ext) if !ext.is_empty() => format!("{stem}_{suffix}.{ext}"),
        _ => format!("{stem}_{suffix}"),
    };
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(file_name)
}
