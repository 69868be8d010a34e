use std::{fmt, sync::Arc};

use burn::{
    data::{
        dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
        dataset::{vision::MnistItem, Dataset},
    },
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};

use crate::{model::IMAGE_SIZE, training::TrainingConfig};

/// Names the dataset a loader reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Test => write!(f, "test"),
        }
    }
}

#[derive(Clone, Default)]
pub struct MnistBatcher {}

#[derive(Clone, Debug)]
pub struct MnistBatch<B: Backend> {
    /// Pixel intensities scaled to [0, 1], shape [batch_size, 1, 28, 28].
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, MnistItem, MnistBatch<B>> for MnistBatcher {
    fn batch(&self, items: Vec<MnistItem>, device: &B::Device) -> MnistBatch<B> {
        let images = items
            .iter()
            .map(|item| TensorData::from(item.image).convert::<B::FloatElem>())
            .map(|data| Tensor::<B, 2>::from_data(data, device))
            .map(|tensor| tensor.reshape([1, 1, IMAGE_SIZE, IMAGE_SIZE]))
            .map(|tensor| tensor / 255)
            .collect();

        let targets = items
            .iter()
            .map(|item| {
                Tensor::<B, 1, Int>::from_data(
                    [(item.label as i64).elem::<B::IntElem>()],
                    device,
                )
            })
            .collect();

        let images = Tensor::cat(images, 0);
        let targets = Tensor::cat(targets, 0);

        MnistBatch { images, targets }
    }
}

pub type MnistLoader<B> = Arc<dyn DataLoader<B, MnistBatch<B>>>;

/// The loaders a training run consumes.
///
/// Training batches carry autodiff tensors; evaluation batches live on the
/// gradient-free inner backend.
pub struct MnistLoaders<B: AutodiffBackend> {
    pub train: MnistLoader<B>,
    /// Unshuffled pass over the training set, present when train accuracy is reported.
    pub train_eval: Option<MnistLoader<B::InnerBackend>>,
    pub test: MnistLoader<B::InnerBackend>,
}

impl<B: AutodiffBackend> MnistLoaders<B> {
    pub fn new<Train, Test>(
        dataset_train: Train,
        dataset_test: Test,
        config: &TrainingConfig,
        device: &B::Device,
    ) -> Self
    where
        Train: Dataset<MnistItem> + 'static,
        Test: Dataset<MnistItem> + 'static,
    {
        log::info!(
            "Building loaders over {} train and {} test items",
            dataset_train.len(),
            dataset_test.len()
        );

        let dataset_train = Arc::new(dataset_train);
        let train_eval = config
            .report_train_accuracy
            .then(|| build_loader(dataset_train.clone(), config, device, false));

        Self {
            train: build_loader(dataset_train, config, device, true),
            train_eval,
            test: build_loader(dataset_test, config, device, false),
        }
    }
}

fn build_loader<B, D>(
    dataset: D,
    config: &TrainingConfig,
    device: &B::Device,
    shuffle: bool,
) -> MnistLoader<B>
where
    B: Backend,
    D: Dataset<MnistItem> + 'static,
{
    let mut builder = DataLoaderBuilder::new(MnistBatcher::default())
        .batch_size(config.batch_size)
        .set_device(device.clone());

    if shuffle {
        builder = builder.shuffle(config.seed);
    }
    if let Some(num_workers) = config.num_workers {
        builder = builder.num_workers(num_workers);
    }

    builder.build(dataset)
}
