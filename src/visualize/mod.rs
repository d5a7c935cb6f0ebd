//! Visual QA helpers: colour-coded masks, side-by-side panels and source overlays.

mod palette;
mod render;
mod viewer;

use thiserror::Error;

pub use palette::{CLASS_NAMES, COLOR_MAP, class_color, colorize_mask};
pub use render::{
    outer_contour, overlay_mask, resize_for_display, resize_to, side_by_side, unique_values,
};
pub use viewer::{DISPLAY_SIZE, ViewerCommand, paired_result_path};

use crate::mask::MaskError;

#[derive(Error, Debug)]
pub enum VisualizeError {
    #[error("Dimension mismatch: {left:?} vs {right:?}")]
    DimensionMismatch { left: (u32, u32), right: (u32, u32) },

    #[error(transparent)]
    Mask(#[from] MaskError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
