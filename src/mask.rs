//! Reading class-index mask images and locating them on disk.

use std::path::{Path, PathBuf};

use image::GrayImage;
use thiserror::Error;

pub const SUPPORTED_FILES: [&str; 4] = ["bmp", "jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode `{path}`: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Loads a single-channel mask whose pixel values are class indices.
///
/// Colour images are converted to luma first, so a grey-level mask saved as RGB reads
/// back the same.
pub fn load_class_mask<P: AsRef<Path>>(path: P) -> Result<GrayImage, MaskError> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| MaskError::Image {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(image.into_luma8())
}

pub fn is_supported(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                SUPPORTED_FILES
                    .iter()
                    .any(|&valid_ext| valid_ext.eq_ignore_ascii_case(ext))
            })
}

/// Supported image files directly inside `dir`, sorted by path.
pub fn list_images<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, MaskError> {
    let dir = dir.as_ref();
    let io_error = |source| MaskError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if is_supported(&path) {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

/// First file named `<stem><suffix>.<ext>` in `dir`, trying every supported extension.
pub fn find_by_stem(dir: &Path, stem: &str, suffix: &str) -> Option<PathBuf> {
    SUPPORTED_FILES
        .iter()
        .map(|ext| dir.join(format!("{}{}.{}", stem, suffix, ext)))
        .find(|candidate| candidate.exists())
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
