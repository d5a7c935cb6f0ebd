use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use burn::backend::{NdArray, ndarray::NdArrayDevice};
use burn::config::Config;
use burn::data::dataset::Dataset;
use burn_segmetrics::metrics::{intersection_and_union, nan_mean, pixel_accuracy};
use burn_segmetrics::{
    ConfusionMatrix, MaskPairDataset, SegmentationMetricConfig, SegmentationScores,
    visualize::CLASS_NAMES,
};
use clap::Args;

#[derive(Args)]
pub struct EvaluateArgs {
    /// Directory of predicted class-index masks
    #[arg(short, long)]
    pub predictions: PathBuf,

    /// Directory of ground truth class-index masks, matched by file stem
    #[arg(short, long)]
    pub groundtruth: PathBuf,

    /// Number of classes, background included
    #[arg(short, long, default_value_t = 16)]
    pub num_classes: usize,

    /// Metric configuration (JSON). Overrides --num-classes
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the effective metric configuration to this file
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    /// Also print per-class IoU and BER
    #[arg(long, default_value_t = false)]
    pub per_class: bool,

    /// Print pixel accuracy and mIoU of every image
    #[arg(long, default_value_t = false)]
    pub per_image: bool,

    /// Also score with a confusion matrix that keeps background pixels
    #[arg(long, default_value_t = false)]
    pub confusion: bool,
}

pub fn run(args: &EvaluateArgs) -> Result<()> {
    type MyBackend = NdArray<f32>;

    let device = NdArrayDevice::default();

    let config = match &args.config {
        Some(path) => SegmentationMetricConfig::load(path)
            .map_err(|err| anyhow!("Failed to load config {}: {:?}", path.display(), err))?,
        None => SegmentationMetricConfig::new(args.num_classes),
    }
    .single_process();

    if let Some(path) = &args.save_config {
        config
            .save(path)
            .with_context(|| format!("Failed to save config to {}", path.display()))?;
    }

    let dataset = MaskPairDataset::new_from_folders(&args.predictions, &args.groundtruth)?;
    println!("Evaluating {} mask pairs...", dataset.len());

    let mut metric = config.init::<MyBackend>();
    let mut confusion = ConfusionMatrix::new(config.num_classes);
    for item in dataset.iter() {
        let item = item?;
        let (predictions, labels) = item.to_tensors::<MyBackend>(config.num_classes, &device)?;
        metric
            .update(predictions, labels)
            .with_context(|| format!("Failed to score {}", item.stem))?;

        if args.confusion {
            confusion.add_class_maps(&item.prediction, &item.groundtruth)?;
        }
        if args.per_image {
            print_image_scores(
                &item.stem,
                &item.prediction,
                &item.groundtruth,
                config.num_classes,
            );
        }
        tracing::debug!(stem = %item.stem, "scored");
    }

    let scores = metric.get(args.per_class);
    println!("{}", scores);
    print_per_class(&scores);

    if args.confusion {
        println!("Confusion matrix: {}", confusion.score());
    }

    Ok(())
}

fn print_image_scores(stem: &str, prediction: &[i64], groundtruth: &[i64], num_classes: usize) {
    let (accuracy, _, _) = pixel_accuracy(prediction, groundtruth);
    let (area_inter, area_union) = intersection_and_union(prediction, groundtruth, num_classes);
    let iou: Vec<f64> = area_inter
        .iter()
        .zip(&area_union)
        .skip(1)
        .map(|(inter, union)| inter / union)
        .collect();

    println!(
        "{}: pixAcc {:.3}%, mIoU {:.3}%",
        stem,
        100.0 * accuracy,
        100.0 * nan_mean(&iou)
    );
}

fn print_per_class(scores: &SegmentationScores) {
    let Some(per_class) = &scores.per_class else {
        return;
    };

    println!("{:>4}  {:<12} {:>9} {:>9}", "id", "class", "IoU (%)", "BER");
    for (class, (iou, ber)) in per_class.iou.iter().zip(&per_class.ber).enumerate() {
        let name = CLASS_NAMES.get(class).copied().unwrap_or("-");
        println!("{:>4}  {:<12} {:>9.3} {:>9.3}", class, name, 100.0 * iou, ber);
    }
}
