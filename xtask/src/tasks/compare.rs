use std::path::PathBuf;

use anyhow::{Context, Result};
use burn_segmetrics::mask;
use burn_segmetrics::visualize::{ViewerCommand, overlay_mask, paired_result_path};
use clap::Args;

use super::{create_output_dir, prompt_command};

#[derive(Args)]
pub struct CompareArgs {
    /// Directory of source images
    #[arg(short, long, default_value = "demo/imgs")]
    pub sources: PathBuf,

    /// Directory of result masks named `<stem><suffix>.png`
    #[arg(short, long, default_value = "demo/result")]
    pub results: PathBuf,

    /// Suffix appended to the source stem to find its result mask
    #[arg(long, default_value = "_glass")]
    pub suffix: String,

    /// Directory the overlays are written to
    #[arg(short, long, default_value = "compare")]
    pub output: PathBuf,

    /// Render every file without waiting for a command
    #[arg(long, default_value_t = false)]
    pub no_wait: bool,
}

pub fn run(args: &CompareArgs) -> Result<()> {
    create_output_dir(&args.output)?;

    for source_path in mask::list_images(&args.sources)? {
        let result_path = paired_result_path(&args.results, &source_path, &args.suffix);
        if !result_path.exists() {
            tracing::warn!(
                source = %source_path.display(),
                result = %result_path.display(),
                "no result mask, skipping"
            );
            continue;
        }

        let source = image::open(&source_path)
            .with_context(|| format!("Failed to open source image {}", source_path.display()))?
            .into_rgb8();
        let result = mask::load_class_mask(&result_path)?;

        let overlay = overlay_mask(&source, &result)
            .with_context(|| format!("Cannot overlay {}", result_path.display()))?;
        let output_path = args
            .output
            .join(format!("{}.png", mask::file_stem(&source_path)));
        overlay
            .save(&output_path)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        println!("Rendered {}", output_path.display());

        if !args.no_wait && prompt_command()? == ViewerCommand::Quit {
            break;
        }
    }

    Ok(())
}
