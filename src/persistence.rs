use std::path::{Path, PathBuf};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};

use crate::{
    error::Result,
    model::{Model, ModelConfig},
};

type ModelRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Writes the model parameters, and nothing else, to `path`.
///
/// The recorder appends its `.mpk` extension; the returned path is the file written.
pub fn save_model<B: Backend>(model: &Model<B>, path: &Path) -> Result<PathBuf> {
    let recorder = ModelRecorder::new();
    model.clone().save_file(path, &recorder)?;

    let written = path.with_extension("mpk");
    log::info!("Saved model parameters to {}", written.display());

    Ok(written)
}

/// Builds a model from `config` and loads the parameters saved at `path`.
pub fn load_model<B: Backend>(
    config: &ModelConfig,
    path: &Path,
    device: &B::Device,
) -> Result<Model<B>> {
    let model = config
        .init::<B>(device)
        .load_file(path, &ModelRecorder::new(), device)?;

    Ok(model)
}
