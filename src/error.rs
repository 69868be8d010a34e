use burn::record::RecorderError;
use thiserror::Error;

use crate::data::Split;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TrainError>;

/// Errors that end a training run.
#[derive(Error, Debug)]
pub enum TrainError {
    /// Accuracy was requested over a loader that yielded no items.
    #[error("the {0} dataset yielded no items, accuracy is undefined")]
    EmptyDataset(Split),

    /// Batches must hold at least one item.
    #[error("the batch size must be at least 1")]
    ZeroBatchSize,

    /// An accelerator was requested but no accelerator backend is compiled in.
    #[error("no accelerator backend is available in this build, rerun with --cpu")]
    AcceleratorUnavailable,

    /// Artifact directory or configuration file could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The model record could not be saved or loaded.
    #[error("model record error: {0}")]
    Record(#[from] RecorderError),
}
