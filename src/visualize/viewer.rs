use std::path::{Path, PathBuf};

use crate::mask;

/// Size each panel is scaled to on a resize request.
pub const DISPLAY_SIZE: (u32, u32) = (800, 600);

/// What to do after a mask has been shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    Quit,
    Resize,
    Next,
}

impl ViewerCommand {
    /// Interprets one line of user input. `None` means the input was closed.
    pub fn parse(input: Option<&str>) -> Self {
        match input.map(str::trim) {
            None | Some("q") => Self::Quit,
            Some("r") => Self::Resize,
            Some(_) => Self::Next,
        }
    }
}

/// Location of the result mask for `source`: `<results_dir>/<stem><suffix>.png`.
pub fn paired_result_path(results_dir: &Path, source: &Path, suffix: &str) -> PathBuf {
    results_dir.join(format!("{}{}.png", mask::file_stem(source), suffix))
}
