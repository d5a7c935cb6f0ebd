use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn_segmetrics::mask;
use burn_segmetrics::visualize::{
    ViewerCommand, colorize_mask, resize_for_display, resize_to, side_by_side, unique_values,
};
use clap::Args;
use image::RgbImage;

use super::{create_output_dir, prompt_command};

#[derive(Args)]
pub struct ViewArgs {
    /// A mask file or a directory of masks
    pub path: PathBuf,

    /// Directory of source images shown next to the mask with the same stem
    #[arg(short, long)]
    pub sources: Option<PathBuf>,

    /// Directory the rendered panels are written to
    #[arg(short, long, default_value = "view")]
    pub output: PathBuf,

    /// Render every file without waiting for a command
    #[arg(long, default_value_t = false)]
    pub no_wait: bool,
}

pub fn run(args: &ViewArgs) -> Result<()> {
    let files = if args.path.is_dir() {
        mask::list_images(&args.path)?
    } else if args.path.exists() {
        vec![args.path.clone()]
    } else {
        anyhow::bail!("{} does not exist", args.path.display());
    };

    println!(
        "Viewing {} mask{}:",
        files.len(),
        if files.len() != 1 { "s" } else { "" }
    );
    for file in &files {
        println!("\t{}", file.display());
    }

    create_output_dir(&args.output)?;

    for file in &files {
        println!("{}", file.display());
        let class_mask = mask::load_class_mask(file)?;
        println!("{:?}", unique_values(&class_mask));

        let colored = colorize_mask(&class_mask);
        let left = load_source(args.sources.as_deref(), file, colored.dimensions())?
            .unwrap_or_else(|| colored.clone());
        let output_path = args.output.join(format!("{}.png", mask::file_stem(file)));

        render(&left, &colored, false, &output_path)?;
        if args.no_wait {
            continue;
        }

        loop {
            match prompt_command()? {
                ViewerCommand::Quit => return Ok(()),
                ViewerCommand::Resize => render(&left, &colored, true, &output_path)?,
                ViewerCommand::Next => break,
            }
        }
    }

    println!("Done");
    Ok(())
}

/// The source image with the mask's stem, scaled to the mask's size.
fn load_source(
    sources: Option<&Path>,
    mask_path: &Path,
    mask_size: (u32, u32),
) -> Result<Option<RgbImage>> {
    let Some(dir) = sources else {
        return Ok(None);
    };

    match mask::find_by_stem(dir, &mask::file_stem(mask_path), "") {
        Some(path) => {
            let image = image::open(&path)
                .with_context(|| format!("Failed to open source image {}", path.display()))?
                .into_rgb8();
            if image.dimensions() != mask_size {
                tracing::warn!(
                    source = %path.display(),
                    source_size = ?image.dimensions(),
                    mask_size = ?mask_size,
                    "source and mask sizes differ, scaling the source"
                );
            }
            Ok(Some(resize_to(&image, mask_size)))
        }
        None => {
            tracing::warn!(mask = %mask_path.display(), "no source image, showing the mask twice");
            Ok(None)
        }
    }
}

fn render(left: &RgbImage, right: &RgbImage, resize: bool, output_path: &Path) -> Result<()> {
    let frame = if resize {
        side_by_side(&resize_for_display(left), &resize_for_display(right))?
    } else {
        side_by_side(left, right)?
    };

    frame
        .save(output_path)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    println!("Rendered {}", output_path.display());

    Ok(())
}
