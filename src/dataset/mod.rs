mod masks;

pub use masks::{MaskDatasetError, MaskPairDataset, MaskPairItem, MaskPairRaw, MaskPairResult};
