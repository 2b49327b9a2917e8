//! Resolution estimation and target dimensions.

/// Pages below this estimated DPI are upscaled
pub const MIN_DPI: u32 = 150;

/// Resolution upscaling aims for
pub const TARGET_DPI: u32 = 300;

/// Largest upscale factor applied
pub const MAX_UPSCALE: f64 = 3.0;

/// Upscaled pages never exceed this on either side
pub const MAX_DIMENSION: u32 = 2048;

/// Longer edge of the image sent to the backend
pub const TRANSMISSION_MAX_EDGE: u32 = 800;

/// Estimate scan resolution from pixel dimensions, assuming an A4 page.
///
/// Either side reaching a breakpoint is enough.
pub fn estimate_dpi(width: u32, height: u32) -> u32 {
    if width >= 2480 || height >= 3508 {
        300
    } else if width >= 1654 || height >= 2339 {
        200
    } else if width >= 1240 || height >= 1754 {
        150
    } else {
        72
    }
}

/// Dimensions after upscaling a low-resolution page, or `None` if no
/// upscaling is needed.
pub fn upscaled_dimensions(width: u32, height: u32, dpi: u32) -> Option<(u32, u32)> {
    if dpi >= MIN_DPI || width == 0 || height == 0 {
        return None;
    }

    let mut scale = (TARGET_DPI as f64 / dpi as f64).min(MAX_UPSCALE);
    if width as f64 * scale > MAX_DIMENSION as f64 || height as f64 * scale > MAX_DIMENSION as f64
    {
        scale = (MAX_DIMENSION as f64 / width as f64).min(MAX_DIMENSION as f64 / height as f64);
    }

    if scale <= 1.0 {
        return None;
    }

    let new_width = ((width as f64 * scale).round() as u32).clamp(1, MAX_DIMENSION);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, MAX_DIMENSION);
    Some((new_width, new_height))
}

/// Dimensions for the transmission copy: longer edge at most
/// [`TRANSMISSION_MAX_EDGE`], aspect ratio preserved.
pub fn transmission_dimensions(width: u32, height: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= TRANSMISSION_MAX_EDGE {
        return (width, height);
    }

    let scaled = |side: u32| -> u32 {
        ((side as f64 * TRANSMISSION_MAX_EDGE as f64 / longer as f64).round() as u32).max(1)
    };

    if width >= height {
        (TRANSMISSION_MAX_EDGE, scaled(height))
    } else {
        (scaled(width), TRANSMISSION_MAX_EDGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dpi_breakpoints() {
        assert_eq!(estimate_dpi(2480, 3508), 300);
        assert_eq!(estimate_dpi(2480, 100), 300);
        assert_eq!(estimate_dpi(1654, 2339), 200);
        assert_eq!(estimate_dpi(1240, 1754), 150);
        assert_eq!(estimate_dpi(1000, 1754), 150);
        assert_eq!(estimate_dpi(800, 1100), 72);
    }

    #[test]
    fn test_upscale_capped_at_max_dimension() {
        // 72 DPI: factor 300/72 capped to 3, then 1000*3 exceeds 2048
        let (w, h) = upscaled_dimensions(1000, 700, 72).unwrap();
        assert_eq!(w, 2048);
        assert!(h <= MAX_DIMENSION);
        assert_eq!(h, 1434);
    }

    #[test]
    fn test_small_page_gets_full_factor() {
        assert_eq!(upscaled_dimensions(400, 600, 72), Some((1200, 1800)));
    }

    #[test]
    fn test_no_upscale_at_or_above_min_dpi() {
        assert_eq!(upscaled_dimensions(1240, 1754, 150), None);
        assert_eq!(upscaled_dimensions(2480, 3508, 300), None);
    }

    #[test]
    fn test_transmission_landscape() {
        assert_eq!(transmission_dimensions(4000, 3000), (800, 600));
    }

    #[test]
    fn test_transmission_portrait_and_small() {
        assert_eq!(transmission_dimensions(2048, 2896), (566, 800));
        assert_eq!(transmission_dimensions(640, 480), (640, 480));
    }
}
