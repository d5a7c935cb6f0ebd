use image::{GrayImage, Rgb, RgbImage};

/// RGB colour of each class index.
pub const COLOR_MAP: [[u8; 3]; 16] = [
    [0, 0, 0],
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [255, 0, 255],
    [255, 255, 255],
    [0, 255, 255],
    [50, 0, 0],
    [0, 50, 0],
    [0, 0, 50],
    [50, 50, 0],
    [50, 0, 50],
    [50, 50, 50],
    [0, 50, 50],
    [100, 200, 255],
];

pub const CLASS_NAMES: [&str; 16] = [
    "background",
    "water",
    "wine",
    "juice",
    "cocktails",
    "soda",
    "coffee",
    "tea",
    "boba",
    "chemical",
    "medical",
    "milk",
    "spirits",
    "honey",
    "misc",
    "misc",
];

/// Black for the background and for indices the palette does not cover.
pub fn class_color(class: u8) -> Rgb<u8> {
    match COLOR_MAP.get(class as usize) {
        Some(&color) if class > 0 => Rgb(color),
        _ => Rgb([0, 0, 0]),
    }
}

pub fn colorize_mask(mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        class_color(mask.get_pixel(x, y)[0])
    })
}
