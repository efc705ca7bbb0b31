//! Snapping a raster onto a reference grid.
//!
//! Offsets are measured between bottom-left origins, but samples are
//! stored top row first, so the candidate's first row lands on
//! reference row `reference.height - candidate.height - y_offset`.

use crate::MatchError;
use geo::{
    geometry::{Point, Polygon, Rect},
    BoundingRect, Contains,
};
use georaster::{Grid, RasterBuffer, C};
use log::debug;

/// Returns a copy of `candidate` conformed to `reference`.
///
/// The result has the reference's origin, dimensions, cell size and
/// projection. Candidate samples are placed at the nearest whole-cell
/// offset; reference cells the candidate does not cover, and
/// candidate NoData cells, are set to `nodata` (or the candidate's
/// own NoData if `None`).
///
/// A candidate larger than the reference is clipped to the
/// reference's extent first. That happens at most once: if it is
/// still too large the result is [MatchError::AlignmentOverflow].
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn align(
    reference: &Grid,
    candidate: &RasterBuffer,
    nodata: Option<f32>,
) -> Result<RasterBuffer, MatchError> {
    check_compatible(reference, candidate.grid())?;
    let nodata = nodata.unwrap_or_else(|| candidate.nodata());

    let clipped;
    let candidate = if exceeds(reference, candidate.grid()) {
        debug!(
            "clipping {}x{} candidate to {}x{} reference",
            candidate.width(),
            candidate.height(),
            reference.width,
            reference.height
        );
        clipped = clip(candidate, reference.rect())?;
        if exceeds(reference, clipped.grid()) {
            return Err(MatchError::AlignmentOverflow {
                width: clipped.width(),
                height: clipped.height(),
                reference_width: reference.width,
                reference_height: reference.height,
            });
        }
        &clipped
    } else {
        candidate
    };

    let (x_offset, y_offset) = offsets(reference, candidate.grid());
    let (ref_w, ref_h, cand_w, cand_h) = (
        reference.width as isize,
        reference.height as isize,
        candidate.width() as isize,
        candidate.height() as isize,
    );
    let top = ref_h - cand_h - y_offset;

    let mut samples = vec![nodata; reference.len()];
    let (col_start, col_end) = (x_offset.max(0), (x_offset + cand_w).min(ref_w));
    let (row_start, row_end) = (top.max(0), (top + cand_h).min(ref_h));
    for row in row_start..row_end {
        for col in col_start..col_end {
            let value = candidate.get_xy(((col - x_offset) as usize, (row - top) as usize));
            samples[row as usize * reference.width + col as usize] =
                if candidate.is_nodata(value) { nodata } else { value };
        }
    }

    Ok(RasterBuffer::new(reference.clone(), nodata, samples)?)
}

/// Returns the part of `raster` covering `rect`.
///
/// Window edges are rounded to the nearest cell boundary, so a cell
/// is kept when at least half of it lies inside `rect`. The result
/// may be empty but is never larger than `raster`.
pub fn clip(raster: &RasterBuffer, rect: Rect<C>) -> Result<RasterBuffer, MatchError> {
    let grid = raster.grid();
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    let edge = |cells: C, len: usize| cells.round().clamp(0.0, len as C) as usize;
    let col_start = edge((rect.min().x - grid.origin.x) / grid.cell.width, grid.width);
    let col_end = edge((rect.max().x - grid.origin.x) / grid.cell.width, grid.width).max(col_start);
    let row_start = edge((grid.ymax() - rect.max().y) / grid.cell.height, grid.height);
    let row_end = edge((grid.ymax() - rect.min().y) / grid.cell.height, grid.height).max(row_start);

    let mut samples = Vec::with_capacity((col_end - col_start) * (row_end - row_start));
    for row in row_start..row_end {
        for col in col_start..col_end {
            samples.push(raster.get_xy((col, row)));
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let clipped = Grid {
        origin: geo::Coord {
            x: grid.origin.x + col_start as C * grid.cell.width,
            y: grid.ymax() - row_end as C * grid.cell.height,
        },
        cell: grid.cell,
        width: col_end - col_start,
        height: row_end - row_start,
        projection: grid.projection.clone(),
    };
    Ok(RasterBuffer::new(clipped, raster.nodata(), samples)?)
}

/// Returns the part of `raster` inside `polygon`.
///
/// The raster is first [clip]ped to the polygon's bounding box. Cells
/// of that window whose centers are not inside `polygon` become
/// NoData. `polygon` must be in the raster's projection.
pub fn clip_to_polygon(
    raster: &RasterBuffer,
    polygon: &Polygon<C>,
) -> Result<RasterBuffer, MatchError> {
    let Some(bounds) = polygon.bounding_rect() else {
        // No vertices, nothing inside.
        return clip(raster, Rect::new(raster.origin(), raster.origin()));
    };
    let window = clip(raster, bounds)?;
    let grid = window.grid();
    debug!(
        "masking {}x{} window to polygon of {} vertices",
        grid.width,
        grid.height,
        polygon.exterior().0.len()
    );

    let nodata = window.nodata();
    let samples = (0..grid.height)
        .flat_map(|row| (0..grid.width).map(move |col| (col, row)))
        .map(|xy| {
            if polygon.contains(&Point::from(grid.xy_to_coord(xy))) {
                window.get_xy(xy)
            } else {
                nodata
            }
        })
        .collect();
    Ok(RasterBuffer::new(grid.clone(), nodata, samples)?)
}

/// Fails unless `candidate` shares `reference`'s projection and cell
/// size.
pub fn check_compatible(reference: &Grid, candidate: &Grid) -> Result<(), MatchError> {
    if reference.projection != candidate.projection {
        return Err(MatchError::ProjectionMismatch {
            reference: reference.projection.clone(),
            candidate: candidate.projection.clone(),
        });
    }
    if !reference.cell.matches(&candidate.cell) {
        return Err(MatchError::ResolutionMismatch {
            reference: reference.cell,
            candidate: candidate.cell,
        });
    }
    Ok(())
}

/// Whole-cell `(x, y)` offset of `candidate`'s origin from
/// `reference`'s, y positive northward.
///
/// Offsets are clamped to the combined extent of both grids along each
/// axis; anything further out covers no reference cell either way.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn offsets(reference: &Grid, candidate: &Grid) -> (isize, isize) {
    let span = |r: usize, c: usize| r.saturating_add(c) as C;
    let x_span = span(reference.width, candidate.width);
    let y_span = span(reference.height, candidate.height);
    let x = ((candidate.origin.x - reference.origin.x) / candidate.cell.width)
        .round()
        .clamp(-x_span, x_span);
    let y = ((candidate.origin.y - reference.origin.y) / candidate.cell.height)
        .round()
        .clamp(-y_span, y_span);
    (x as isize, y as isize)
}

fn exceeds(reference: &Grid, candidate: &Grid) -> bool {
    candidate.width > reference.width || candidate.height > reference.height
}
