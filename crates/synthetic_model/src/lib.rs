mod backend;
pub mod network;
pub mod pretrained;
pub mod train;

pub use backend::{SyntheticModel, SyntheticPredictor, SyntheticTrainer};
pub use network::{DenseLayer, DenseNetwork};
pub use pretrained::{LogisticModel, LogisticPredictor, PretrainedTrainer};
pub use train::{EpochReport, FitError, TrainOptions};
