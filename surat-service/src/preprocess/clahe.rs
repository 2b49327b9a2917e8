//! Contrast-limited adaptive histogram equalization on grayscale images.

use image::GrayImage;

const BINS: usize = 256;

/// Equalize `image` over a `tiles_x` by `tiles_y` grid.
///
/// Each tile's histogram is clipped at `clip_limit` times the mean bin height
/// and the excess spread evenly; pixels blend the four nearest tile mappings.
pub fn equalize(image: &GrayImage, tiles_x: u32, tiles_y: u32, clip_limit: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tiles_x = tiles_x.clamp(1, width);
    let tiles_y = tiles_y.clamp(1, height);
    let tile_w = width.div_ceil(tiles_x);
    let tile_h = height.div_ceil(tiles_y);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(image, x0, y0, x1, y1, clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    GrayImage::from_fn(width, height, |x, y| {
        let (tx0, tx1, ax) = neighbours(x, tile_w, tiles_x);
        let (ty0, ty1, ay) = neighbours(y, tile_h, tiles_y);
        let value = image.get_pixel(x, y)[0] as usize;

        let top = lut_at(tx0, ty0)[value] * (1.0 - ax) + lut_at(tx1, ty0)[value] * ax;
        let bottom = lut_at(tx0, ty1)[value] * (1.0 - ax) + lut_at(tx1, ty1)[value] * ax;
        let blended = top * (1.0 - ay) + bottom * ay;

        image::Luma([blended.round().clamp(0.0, 255.0) as u8])
    })
}

/// Tile indices either side of a coordinate and the blend weight toward the second
fn neighbours(coord: u32, tile_size: u32, tiles: u32) -> (u32, u32, f32) {
    let centre = (coord as f32 + 0.5) / tile_size as f32 - 0.5;
    if centre <= 0.0 {
        return (0, 0, 0.0);
    }

    let first = (centre.floor() as u32).min(tiles - 1);
    let second = (first + 1).min(tiles - 1);
    let weight = if first == second {
        0.0
    } else {
        centre - first as f32
    };
    (first, second, weight.clamp(0.0, 1.0))
}

fn tile_lut(image: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> Vec<f32> {
    let mut histogram = [0u32; BINS];
    for y in y0..y1 {
        for x in x0..x1 {
            histogram[image.get_pixel(x, y)[0] as usize] += 1;
        }
    }

    let area = ((x1 - x0) * (y1 - y0)).max(1);
    let limit = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);

    let mut excess = 0u32;
    for count in histogram.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    let share = excess / BINS as u32;
    let remainder = (excess % BINS as u32) as usize;
    for (bin, count) in histogram.iter_mut().enumerate() {
        *count += share + u32::from(bin < remainder);
    }

    let scale = 255.0 / area as f32;
    let mut cumulative = 0u32;
    histogram
        .iter()
        .map(|count| {
            cumulative += count;
            (cumulative as f32 * scale).min(255.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spread(image: &GrayImage) -> u8 {
        let min = image.pixels().map(|p| p[0]).min().unwrap();
        let max = image.pixels().map(|p| p[0]).max().unwrap();
        max - min
    }

    #[test]
    fn test_preserves_dimensions() {
        let image = GrayImage::from_fn(37, 21, |x, y| image::Luma([((x + y) % 256) as u8]));
        let result = equalize(&image, 8, 8, 2.0);
        assert_eq!(result.dimensions(), (37, 21));
    }

    #[test]
    fn test_stretches_low_contrast() {
        // Faded scan: values confined to 100..=131
        let image = GrayImage::from_fn(128, 128, |x, y| image::Luma([100 + ((x + y) % 32) as u8]));
        let result = equalize(&image, 8, 8, 2.0);
        assert!(spread(&result) > spread(&image));
    }

    #[test]
    fn test_tiny_image() {
        let image = GrayImage::from_pixel(3, 2, image::Luma([128]));
        let result = equalize(&image, 8, 8, 2.0);
        assert_eq!(result.dimensions(), (3, 2));
    }

    #[test]
    fn test_neighbours_at_edges() {
        assert_eq!(neighbours(0, 16, 8), (0, 0, 0.0));
        let (first, second, weight) = neighbours(127, 16, 8);
        assert_eq!((first, second), (7, 7));
        assert_eq!(weight, 0.0);
    }
}
