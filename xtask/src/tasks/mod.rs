pub mod compare;
pub mod evaluate;
pub mod view;

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use burn_segmetrics::visualize::ViewerCommand;

fn create_output_dir(output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))
}

/// Blocks until the user enters a command on stdin.
fn prompt_command() -> Result<ViewerCommand> {
    print!("[q] quit  [r] resize  [enter] next > ");
    io::stdout().flush()?;

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;

    Ok(ViewerCommand::parse((read > 0).then_some(line.as_str())))
}
