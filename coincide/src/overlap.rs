use crate::{align, MatchError};
use georaster::RasterBuffer;

/// Value written where both inputs hold data.
pub const OVERLAP: f32 = 1.0;

/// Value written everywhere else. Also the mask's NoData.
pub const NO_OVERLAP: f32 = 0.0;

/// Returns a mask that is [OVERLAP] where both `a` and `b` hold
/// valid data and [NO_OVERLAP] elsewhere.
///
/// The inputs must be coincident. The mask takes their grid and uses
/// `0` as NoData, so `overlap(a, b) == overlap(b, a)`.
pub fn overlap(a: &RasterBuffer, b: &RasterBuffer) -> Result<RasterBuffer, MatchError> {
    if !a.is_coincident(b) {
        return Err(MatchError::NotCoincident);
    }
    let samples = a
        .iter()
        .zip(b.iter())
        .map(|(va, vb)| {
            if a.is_nodata(va) || b.is_nodata(vb) {
                NO_OVERLAP
            } else {
                OVERLAP
            }
        })
        .collect();
    Ok(RasterBuffer::new(a.grid().clone(), NO_OVERLAP, samples)?)
}

/// Snaps `other` onto `reference`'s grid, then returns their
/// [overlap].
pub fn overlap_snapped(
    reference: &RasterBuffer,
    other: &RasterBuffer,
) -> Result<RasterBuffer, MatchError> {
    let snapped = align(reference.grid(), other, None)?;
    overlap(reference, &snapped)
}

#[cfg(test)]
mod tests {
    use super::{overlap, overlap_snapped, NO_OVERLAP};
    use crate::{
        align::tests::{grid, raster},
        MatchError,
    };

    #[test]
    fn test_overlap_is_symmetric() {
        let a = raster(grid(3, 1, (0.0, 0.0), 1.0), -9999.0, vec![1.0, -9999.0, 3.0]);
        let b = raster(grid(3, 1, (0.0, 0.0), 1.0), 0.0, vec![0.0, 2.0, 4.0]);
        let ab = overlap(&a, &b).unwrap();
        let ba = overlap(&b, &a).unwrap();
        assert_eq!(ab.to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(ab, ba);
        assert_eq!(ab.nodata(), NO_OVERLAP);
        assert_eq!(ab.grid(), a.grid());
    }

    #[test]
    fn test_nan_is_never_overlap() {
        let a = raster(grid(2, 1, (0.0, 0.0), 1.0), f32::NAN, vec![f32::NAN, 1.0]);
        let b = raster(grid(2, 1, (0.0, 0.0), 1.0), -1.0, vec![1.0, 1.0]);
        assert_eq!(overlap(&a, &b).unwrap().to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_not_coincident() {
        let a = raster(grid(2, 2, (0.0, 0.0), 1.0), 0.0, vec![1.0; 4]);
        let b = raster(grid(2, 2, (1.0, 0.0), 1.0), 0.0, vec![1.0; 4]);
        assert!(matches!(overlap(&a, &b), Err(MatchError::NotCoincident)));
    }

    #[test]
    fn test_overlap_after_snapping() {
        let reference = raster(grid(3, 3, (0.0, 0.0), 1.0), -9999.0, vec![1.0; 9]);
        let other = raster(grid(2, 2, (1.0, 1.0), 1.0), -9999.0, vec![1.0; 4]);
        let mask = overlap_snapped(&reference, &other).unwrap();
        #[rustfmt::skip]
        let expected = vec![
            0., 1., 1.,
            0., 1., 1.,
            0., 0., 0.,
        ];
        assert_eq!(mask.to_vec(), expected);
    }
}
