use std::collections::{BTreeSet, VecDeque};

use image::{GrayImage, Luma, Rgb, RgbImage, imageops};

use super::{DISPLAY_SIZE, VisualizeError};

const CONTOUR_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BACKGROUND_DIM: f32 = 0.25;

/// Sorted distinct pixel values of a mask.
pub fn unique_values(mask: &GrayImage) -> Vec<u8> {
    mask.as_raw()
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Places `right` next to `left`. Both panels must have the same height.
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> Result<RgbImage, VisualizeError> {
    if left.height() != right.height() {
        return Err(VisualizeError::DimensionMismatch {
            left: left.dimensions(),
            right: right.dimensions(),
        });
    }

    let mut canvas = RgbImage::new(left.width() + right.width(), left.height());
    imageops::replace(&mut canvas, left, 0, 0);
    imageops::replace(&mut canvas, right, left.width() as i64, 0);

    Ok(canvas)
}

/// `image` scaled to `(width, height)`, or an unchanged copy when it already fits.
pub fn resize_to(image: &RgbImage, (width, height): (u32, u32)) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }

    imageops::resize(image, width, height, imageops::FilterType::Triangle)
}

pub fn resize_for_display(image: &RgbImage) -> RgbImage {
    let (width, height) = DISPLAY_SIZE;
    imageops::resize(image, width, height, imageops::FilterType::Triangle)
}

/// Foreground pixels (value > 0) that touch the image border or the background
/// reachable from it. Boundaries of holes inside a region are not part of it.
pub fn outer_contour(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let is_foreground = |x: u32, y: u32| mask.get_pixel(x, y)[0] > 0;

    let mut exterior = vec![false; (width * height) as usize];
    let index = |x: u32, y: u32| (y * width + x) as usize;
    let mut queue = VecDeque::new();

    for y in 0..height {
        for x in 0..width {
            let on_border = x == 0 || y == 0 || x + 1 == width || y + 1 == height;
            if on_border && !is_foreground(x, y) {
                exterior[index(x, y)] = true;
                queue.push_back((x, y));
            }
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        for (nx, ny) in neighbours(x, y, width, height) {
            if !is_foreground(nx, ny) && !exterior[index(nx, ny)] {
                exterior[index(nx, ny)] = true;
                queue.push_back((nx, ny));
            }
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let on_border = x == 0 || y == 0 || x + 1 == width || y + 1 == height;
        let touches_exterior = neighbours(x, y, width, height)
            .into_iter()
            .any(|(nx, ny)| exterior[index(nx, ny)]);

        if is_foreground(x, y) && (on_border || touches_exterior) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Keeps the source inside the mask, dims it outside and outlines the mask in green.
pub fn overlay_mask(source: &RgbImage, mask: &GrayImage) -> Result<RgbImage, VisualizeError> {
    if source.dimensions() != mask.dimensions() {
        return Err(VisualizeError::DimensionMismatch {
            left: source.dimensions(),
            right: mask.dimensions(),
        });
    }

    let contour = outer_contour(mask);

    Ok(RgbImage::from_fn(source.width(), source.height(), |x, y| {
        if contour.get_pixel(x, y)[0] > 0 {
            return CONTOUR_COLOR;
        }

        let pixel = *source.get_pixel(x, y);
        if mask.get_pixel(x, y)[0] > 0 {
            pixel
        } else {
            Rgb(pixel.0.map(|channel| (channel as f32 * BACKGROUND_DIM) as u8))
        }
    }))
}

fn neighbours(x: u32, y: u32, width: u32, height: u32) -> Vec<(u32, u32)> {
    let mut result = Vec::with_capacity(4);
    if x > 0 {
        result.push((x - 1, y));
    }
    if y > 0 {
        result.push((x, y - 1));
    }
    if x + 1 < width {
        result.push((x + 1, y));
    }
    if y + 1 < height {
        result.push((x, y + 1));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from_rows(rows: &[&[u8]]) -> GrayImage {
        let width = rows[0].len() as u32;
        let values = rows.iter().flat_map(|row| row.iter().copied()).collect();
        GrayImage::from_raw(width, rows.len() as u32, values).unwrap()
    }

    fn marked(image: &GrayImage) -> Vec<(u32, u32)> {
        image
            .enumerate_pixels()
            .filter(|(_, _, pixel)| pixel[0] > 0)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn unique_values_are_sorted() {
        let mask = mask_from_rows(&[&[3, 0, 3], &[1, 0, 2]]);

        assert_eq!(unique_values(&mask), vec![0, 1, 2, 3]);
    }

    #[test]
    fn side_by_side_stacks_horizontally() {
        let left = RgbImage::from_pixel(2, 3, Rgb([1, 1, 1]));
        let right = RgbImage::from_pixel(4, 3, Rgb([9, 9, 9]));

        let canvas = side_by_side(&left, &right).unwrap();

        assert_eq!(canvas.dimensions(), (6, 3));
        assert_eq!(canvas.get_pixel(1, 2), &Rgb([1, 1, 1]));
        assert_eq!(canvas.get_pixel(2, 0), &Rgb([9, 9, 9]));
    }

    #[test]
    fn side_by_side_rejects_different_heights() {
        let left = RgbImage::new(2, 3);
        let right = RgbImage::new(2, 4);

        assert!(matches!(
            side_by_side(&left, &right),
            Err(VisualizeError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn source_resized_to_mask_fits_next_to_it() {
        let source = RgbImage::from_pixel(8, 6, Rgb([5, 5, 5]));
        let colored = RgbImage::new(4, 3);

        let fitted = resize_to(&source, colored.dimensions());
        let canvas = side_by_side(&fitted, &colored).unwrap();

        assert_eq!(fitted.dimensions(), (4, 3));
        assert_eq!(canvas.dimensions(), (8, 3));
        assert_eq!(resize_to(&colored, (4, 3)), colored);
    }

    #[test]
    fn resizes_to_display_size() {
        let image = RgbImage::new(10, 10);

        assert_eq!(resize_for_display(&image).dimensions(), DISPLAY_SIZE);
    }

    #[test]
    fn contour_skips_interior_and_hole_boundaries() {
        let mask = mask_from_rows(&[
            &[0, 0, 0, 0, 0, 0, 0],
            &[0, 1, 1, 1, 1, 1, 0],
            &[0, 1, 1, 1, 1, 1, 0],
            &[0, 1, 1, 0, 1, 1, 0],
            &[0, 1, 1, 1, 1, 1, 0],
            &[0, 1, 1, 1, 1, 1, 0],
            &[0, 0, 0, 0, 0, 0, 0],
        ]);

        let contour = outer_contour(&mask);
        let points = marked(&contour);

        // Ring of the 5x5 square only: the pixels around the hole stay unmarked.
        assert_eq!(points.len(), 16);
        assert!(!points.contains(&(3, 2)));
        assert!(!points.contains(&(2, 2)));
        assert!(points.contains(&(1, 1)));
        assert!(points.contains(&(5, 3)));
    }

    #[test]
    fn contour_includes_foreground_on_the_image_border() {
        let mask = mask_from_rows(&[&[1, 1, 1], &[1, 1, 1], &[1, 1, 1]]);

        let points = marked(&outer_contour(&mask));

        assert_eq!(points.len(), 8);
        assert!(!points.contains(&(1, 1)));
    }

    #[test]
    fn overlay_dims_background_and_outlines_mask() {
        let source = RgbImage::from_pixel(4, 4, Rgb([200, 100, 40]));
        let mask = mask_from_rows(&[&[0, 0, 0, 0], &[0, 1, 1, 1], &[0, 1, 1, 1], &[0, 1, 1, 1]]);

        let overlay = overlay_mask(&source, &mask).unwrap();

        assert_eq!(overlay.get_pixel(0, 0), &Rgb([50, 25, 10]));
        assert_eq!(overlay.get_pixel(1, 1), &CONTOUR_COLOR);
        assert_eq!(overlay.get_pixel(3, 3), &CONTOUR_COLOR);
        assert_eq!(overlay.get_pixel(2, 2), &Rgb([200, 100, 40]));
    }

    #[test]
    fn overlay_rejects_mismatched_mask() {
        let source = RgbImage::new(4, 4);
        let mask = GrayImage::new(4, 3);

        assert!(matches!(
            overlay_mask(&source, &mask),
            Err(VisualizeError::DimensionMismatch { .. })
        ));
    }
}
