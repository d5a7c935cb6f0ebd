use std::path::{Path, PathBuf};

use burn::data::dataset::transform::{Mapper, MapperDataset};
use burn::data::dataset::{Dataset, InMemDataset};
use burn::prelude::*;
use image::GrayImage;
use thiserror::Error;

use crate::mask::{self, MaskError};
use crate::metrics::one_hot_logits;

#[derive(Error, Debug)]
pub enum MaskDatasetError {
    #[error(transparent)]
    Mask(#[from] MaskError),

    #[error("No prediction/groundtruth pairs found in `{0}`")]
    NoPairs(PathBuf),

    #[error("Size mismatch for `{stem}`: prediction {prediction:?} vs groundtruth {groundtruth:?}")]
    SizeMismatch {
        stem: String,
        prediction: (u32, u32),
        groundtruth: (u32, u32),
    },

    #[error("Class value {value} in `{stem}` is outside [0, {num_classes})")]
    ClassOutOfRange {
        stem: String,
        value: i64,
        num_classes: usize,
    },
}

/// Paths of a prediction mask and its ground truth, matched by file stem.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskPairRaw {
    pub stem: String,
    pub prediction_path: PathBuf,
    pub groundtruth_path: PathBuf,
}

/// A decoded prediction/groundtruth pair of class-index masks.
#[derive(Debug, Clone)]
pub struct MaskPairItem {
    pub stem: String,
    pub height: usize,
    pub width: usize,
    pub prediction: Vec<i64>,
    pub groundtruth: Vec<i64>,
}

impl MaskPairItem {
    /// Fails on the first pixel of either mask whose value is not a class index.
    pub fn check_classes(&self, num_classes: usize) -> Result<(), MaskDatasetError> {
        let out_of_range = self
            .prediction
            .iter()
            .chain(&self.groundtruth)
            .find(|&&value| value < 0 || value as usize >= num_classes);

        match out_of_range {
            Some(&value) => Err(MaskDatasetError::ClassOutOfRange {
                stem: self.stem.clone(),
                value,
                num_classes,
            }),
            None => Ok(()),
        }
    }

    /// Tensors ready for [SegmentationMetric::update](crate::SegmentationMetric::update),
    /// with a batch dimension of 1.
    ///
    /// The stored prediction is a hard class map, so it becomes one-hot logits.
    pub fn to_tensors<B: Backend>(
        &self,
        num_classes: usize,
        device: &B::Device,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 3, Int>), MaskDatasetError> {
        self.check_classes(num_classes)?;

        let shape = Shape::new([1, self.height, self.width]);
        let class_map = |values: &[i64]| {
            Tensor::<B, 3, Int>::from_data(
                TensorData::new(values.to_vec(), shape.clone()).convert::<B::IntElem>(),
                device,
            )
        };

        Ok((
            one_hot_logits(class_map(&self.prediction), num_classes),
            class_map(&self.groundtruth),
        ))
    }
}

pub type MaskPairResult = Result<MaskPairItem, MaskDatasetError>;

struct PathToMaskPair;

impl Mapper<MaskPairRaw, MaskPairResult> for PathToMaskPair {
    fn map(&self, item: &MaskPairRaw) -> MaskPairResult {
        let prediction = mask::load_class_mask(&item.prediction_path)?;
        let groundtruth = mask::load_class_mask(&item.groundtruth_path)?;

        if prediction.dimensions() != groundtruth.dimensions() {
            return Err(MaskDatasetError::SizeMismatch {
                stem: item.stem.clone(),
                prediction: prediction.dimensions(),
                groundtruth: groundtruth.dimensions(),
            });
        }

        let (width, height) = prediction.dimensions();

        Ok(MaskPairItem {
            stem: item.stem.clone(),
            height: height as usize,
            width: width as usize,
            prediction: class_indices(&prediction),
            groundtruth: class_indices(&groundtruth),
        })
    }
}

fn class_indices(mask: &GrayImage) -> Vec<i64> {
    mask.as_raw().iter().map(|&value| value as i64).collect()
}

type MaskPairMapper = MapperDataset<InMemDataset<MaskPairRaw>, PathToMaskPair, MaskPairRaw>;

/// Prediction masks paired with their ground truth. Images are decoded lazily on `get`.
pub struct MaskPairDataset {
    pairs: Vec<MaskPairRaw>,
    dataset: MaskPairMapper,
}

impl Dataset<MaskPairResult> for MaskPairDataset {
    fn get(&self, index: usize) -> Option<MaskPairResult> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl MaskPairDataset {
    pub fn new_with_pairs(pairs: Vec<MaskPairRaw>) -> Self {
        let dataset = MapperDataset::new(InMemDataset::new(pairs.clone()), PathToMaskPair);

        Self { pairs, dataset }
    }

    /// Pairs every supported image in `predictions_dir` with the ground truth of the
    /// same stem in `groundtruth_dir`. Predictions without ground truth are skipped.
    pub fn new_from_folders<P: AsRef<Path>, G: AsRef<Path>>(
        predictions_dir: P,
        groundtruth_dir: G,
    ) -> Result<Self, MaskDatasetError> {
        let predictions_dir = predictions_dir.as_ref();
        let groundtruth_dir = groundtruth_dir.as_ref();

        let mut pairs = Vec::new();
        for prediction_path in mask::list_images(predictions_dir)? {
            let stem = mask::file_stem(&prediction_path);

            match mask::find_by_stem(groundtruth_dir, &stem, "") {
                Some(groundtruth_path) => pairs.push(MaskPairRaw {
                    stem,
                    prediction_path,
                    groundtruth_path,
                }),
                None => tracing::warn!(
                    path = %prediction_path.display(),
                    "no groundtruth mask, skipping"
                ),
            }
        }

        if pairs.is_empty() {
            return Err(MaskDatasetError::NoPairs(predictions_dir.to_path_buf()));
        }

        tracing::info!(
            pairs = pairs.len(),
            predictions = %predictions_dir.display(),
            groundtruth = %groundtruth_dir.display(),
            "paired masks"
        );

        Ok(Self::new_with_pairs(pairs))
    }

    pub fn pairs(&self) -> &[MaskPairRaw] {
        &self.pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SegmentationMetricConfig;
    use burn::backend::NdArray;
    use image::Luma;

    type TestBackend = NdArray;

    fn write_mask(path: &Path, width: u32, values: &[u8]) {
        let height = values.len() as u32 / width;
        GrayImage::from_raw(width, height, values.to_vec())
            .unwrap()
            .save(path)
            .unwrap();
    }

    fn folders() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let predictions = root.path().join("predictions");
        let groundtruth = root.path().join("groundtruth");
        std::fs::create_dir(&predictions).unwrap();
        std::fs::create_dir(&groundtruth).unwrap();
        (root, predictions, groundtruth)
    }

    #[test]
    fn pairs_masks_by_stem_and_skips_orphans() {
        let (_root, predictions, groundtruth) = folders();
        write_mask(&predictions.join("a.png"), 2, &[1, 1, 2, 0]);
        write_mask(&predictions.join("b.png"), 2, &[1, 1, 2, 0]);
        write_mask(&groundtruth.join("a.bmp"), 2, &[1, 1, 2, 2]);

        let dataset = MaskPairDataset::new_from_folders(&predictions, &groundtruth).unwrap();

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.pairs()[0].stem, "a");
        assert_eq!(dataset.pairs()[0].groundtruth_path, groundtruth.join("a.bmp"));
    }

    #[test]
    fn empty_pairing_is_an_error() {
        let (_root, predictions, groundtruth) = folders();
        write_mask(&predictions.join("a.png"), 1, &[1]);

        let result = MaskPairDataset::new_from_folders(&predictions, &groundtruth);

        assert!(matches!(result, Err(MaskDatasetError::NoPairs(_))));
    }

    #[test]
    fn decoded_pairs_feed_the_accumulator() {
        let (_root, predictions, groundtruth) = folders();
        write_mask(&predictions.join("a.png"), 2, &[1, 1, 2, 0]);
        write_mask(&groundtruth.join("a.png"), 2, &[1, 1, 2, 2]);

        let dataset = MaskPairDataset::new_from_folders(&predictions, &groundtruth).unwrap();
        let item = dataset.get(0).unwrap().unwrap();
        assert_eq!((item.height, item.width), (2, 2));
        assert_eq!(item.groundtruth, vec![1, 1, 2, 2]);

        let device = Default::default();
        let (logits, labels) = item.to_tensors::<TestBackend>(3, &device).unwrap();
        let mut metric = SegmentationMetricConfig::new(3).init::<TestBackend>();
        metric.update(logits, labels).unwrap();

        let scores = metric.get(false);
        assert!((scores.pix_acc - 0.75).abs() < 1e-9);
        assert!((scores.miou - 0.75).abs() < 1e-9);
    }

    #[test]
    fn binary_255_masks_are_rejected_before_scoring() {
        let (_root, predictions, groundtruth) = folders();
        write_mask(&predictions.join("a.png"), 2, &[255, 255, 1, 0]);
        write_mask(&groundtruth.join("a.png"), 2, &[255, 255, 1, 0]);

        let dataset = MaskPairDataset::new_from_folders(&predictions, &groundtruth).unwrap();
        let item = dataset.get(0).unwrap().unwrap();
        let device = Default::default();

        match item.to_tensors::<TestBackend>(3, &device) {
            Err(MaskDatasetError::ClassOutOfRange {
                stem,
                value,
                num_classes,
            }) => {
                assert_eq!(stem, "a");
                assert_eq!(value, 255);
                assert_eq!(num_classes, 3);
            }
            other => panic!("expected an out-of-range class, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn class_check_accepts_the_last_class_index() {
        let item = MaskPairItem {
            stem: "edge".to_string(),
            height: 1,
            width: 3,
            prediction: vec![0, 1, 2],
            groundtruth: vec![2, 2, 0],
        };

        assert!(item.check_classes(3).is_ok());
        assert!(matches!(
            item.check_classes(2),
            Err(MaskDatasetError::ClassOutOfRange { value: 2, .. })
        ));
    }

    #[test]
    fn size_mismatch_is_reported_per_item() {
        let (_root, predictions, groundtruth) = folders();
        write_mask(&predictions.join("a.png"), 2, &[1, 1, 2, 0]);
        GrayImage::from_pixel(3, 3, Luma([1]))
            .save(groundtruth.join("a.png"))
            .unwrap();

        let dataset = MaskPairDataset::new_from_folders(&predictions, &groundtruth).unwrap();

        assert!(matches!(
            dataset.get(0),
            Some(Err(MaskDatasetError::SizeMismatch { .. }))
        ));
    }
}
