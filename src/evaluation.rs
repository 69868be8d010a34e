use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};

use crate::{
    data::{MnistBatch, Split},
    error::{Result, TrainError},
    model::{Mode, Model},
};

/// Classification accuracy of a training model, as a percentage.
///
/// Runs on the gradient-free inner model, so no autodiff graph is built
/// and the model itself is left untouched.
pub fn evaluate<B: AutodiffBackend>(
    model: &Model<B>,
    loader: &dyn DataLoader<B::InnerBackend, MnistBatch<B::InnerBackend>>,
    split: Split,
) -> Result<f64> {
    accuracy(&model.valid(), loader, split)
}

/// Classification accuracy over one full pass of `loader`, as a percentage.
///
/// Fails with [TrainError::EmptyDataset] when the loader yields nothing.
pub fn accuracy<B: Backend>(
    model: &Model<B>,
    loader: &dyn DataLoader<B, MnistBatch<B>>,
    split: Split,
) -> Result<f64> {
    let mut correct = 0usize;
    let mut total = 0usize;

    for batch in loader.iter() {
        let [batch_size] = batch.targets.dims();
        let output = model.forward(batch.images, Mode::Eval);
        let predictions = output.argmax(1).flatten::<1>(0, 1);

        let matches: i64 = predictions
            .equal(batch.targets)
            .int()
            .sum()
            .into_scalar()
            .elem();

        correct += matches as usize;
        total += batch_size;
    }

    if total == 0 {
        return Err(TrainError::EmptyDataset(split));
    }

    let accuracy = 100.0 * correct as f64 / total as f64;
    log::debug!("{split} accuracy {accuracy:.2}% ({correct}/{total})");

    Ok(accuracy)
}
