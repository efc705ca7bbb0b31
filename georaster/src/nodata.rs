//! NoData sentinel matching.
//!
//! Rasters that went through a float conversion rarely hold their
//! sentinel exactly, so a sample is treated as NoData when it falls
//! inside a narrow band around the sentinel rather than on it.

/// Relative half-width of the NoData band (±0.001%).
pub const NODATA_REL_TOLERANCE: f64 = 1e-5;

/// Absolute half-width of the band used when the sentinel is exactly
/// zero, where a relative band would collapse to nothing.
pub const NODATA_ZERO_EPSILON: f64 = 1e-6;

/// Returns `true` if `value` should be considered `nodata`.
///
/// NaN samples are always missing, whatever the sentinel.
pub fn is_nodata(value: f32, nodata: f32) -> bool {
    if value.is_nan() {
        return true;
    }
    if nodata.is_nan() {
        return false;
    }
    let (value, nodata) = (f64::from(value), f64::from(nodata));
    if nodata == 0.0 {
        return value.abs() <= NODATA_ZERO_EPSILON;
    }
    let a = nodata * (1.0 - NODATA_REL_TOLERANCE);
    let b = nodata * (1.0 + NODATA_REL_TOLERANCE);
    a.min(b) <= value && value <= a.max(b)
}

#[cfg(test)]
mod tests {
    use super::is_nodata;

    #[test]
    fn test_negative_sentinel_band() {
        assert!(is_nodata(-9999.0, -9999.0));
        assert!(is_nodata(-9999.05, -9999.0));
        assert!(is_nodata(-9998.95, -9999.0));
        assert!(!is_nodata(-9998.0, -9999.0));
        assert!(!is_nodata(9999.0, -9999.0));
    }

    #[test]
    fn test_positive_sentinel_band() {
        assert!(is_nodata(255.0, 255.0));
        assert!(!is_nodata(254.0, 255.0));
        assert!(is_nodata(65535.5, 65535.0));
    }

    #[test]
    fn test_zero_sentinel_uses_absolute_epsilon() {
        assert!(is_nodata(0.0, 0.0));
        assert!(is_nodata(-0.0, 0.0));
        assert!(is_nodata(1e-7, 0.0));
        assert!(!is_nodata(1e-3, 0.0));
        assert!(!is_nodata(1.0, 0.0));
    }

    #[test]
    fn test_nan() {
        assert!(is_nodata(f32::NAN, -9999.0));
        assert!(is_nodata(f32::NAN, f32::NAN));
        assert!(!is_nodata(0.0, f32::NAN));
        assert!(!is_nodata(-9999.0, f32::NAN));
    }
}
