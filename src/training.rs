use std::path::Path;

use burn::{
    data::dataset::vision::MnistDataset,
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};

use crate::{
    data::{MnistBatch, MnistLoaders, Split},
    error::{self, TrainError},
    evaluation::evaluate,
    event::{TrainingEvent, TrainingObserver},
    model::{Mode, Model, ModelConfig},
    persistence,
};

/// A progress event is emitted every this many batches.
const PROGRESS_INTERVAL: usize = 100;

const CONFIG_FILE: &str = "config.json";
const MODEL_FILE: &str = "model";

#[derive(Config)]
pub struct TrainingConfig {
    #[config(default = 10)]
    pub num_epochs: usize,
    /// Items per batch, at least 1.
    #[config(default = 64)]
    pub batch_size: usize,
    /// Test accuracy percentage that ends training early.
    #[config(default = 96.0)]
    pub target_accuracy: f64,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    #[config(default = 42)]
    pub seed: u64,
    /// Data loading threads; `None` loads on the training thread.
    #[config(default = "None")]
    pub num_workers: Option<usize>,
    #[config(default = true)]
    pub report_train_accuracy: bool,
    pub model: ModelConfig,
    pub optimizer: AdamConfig,
}

impl TrainingConfig {
    /// Default model and an Adam optimizer with betas 0.9/0.999 and epsilon 1e-8.
    pub fn standard() -> Self {
        Self::new(ModelConfig::new(), AdamConfig::new().with_epsilon(1e-8))
    }

    fn check(&self) -> error::Result<()> {
        if self.batch_size == 0 {
            return Err(TrainError::ZeroBatchSize);
        }
        Ok(())
    }
}

/// Why the epoch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    EpochsExhausted,
}

pub struct TrainingOutcome<B: AutodiffBackend> {
    pub model: Model<B>,
    pub stop: StopReason,
    pub epochs_completed: usize,
    /// Optimizer steps applied over the whole run.
    pub steps: usize,
}

/// Trains `model` until the test accuracy reaches `config.target_accuracy`
/// or `config.num_epochs` epochs have run.
pub fn train<B, O>(
    model: Model<B>,
    loaders: &MnistLoaders<B>,
    config: &TrainingConfig,
    device: &B::Device,
    observer: &mut O,
) -> error::Result<TrainingOutcome<B>>
where
    B: AutodiffBackend,
    O: TrainingObserver + ?Sized,
{
    config.check()?;

    let mut model = model;
    let mut optim = config.optimizer.init::<B, Model<B>>();
    let loss_fn = CrossEntropyLossConfig::new().init(device);

    let items_total = loaders.train.num_items();
    let num_batches = items_total.div_ceil(config.batch_size);
    let mut steps = 0;

    for epoch in 0..config.num_epochs {
        log::info!("Executing training epoch {}/{}", epoch + 1, config.num_epochs);

        for (batch_index, batch) in loaders.train.iter().enumerate() {
            let [batch_len] = batch.targets.dims();
            let (updated, loss) = step(model, &mut optim, &loss_fn, batch, config.learning_rate);
            model = updated;
            steps += 1;

            if batch_index % PROGRESS_INTERVAL == 0 {
                observer.on_event(&TrainingEvent::Progress {
                    epoch,
                    batch: batch_index,
                    items_seen: batch_index * batch_len,
                    items_total,
                    percent: 100.0 * batch_index as f64 / num_batches as f64,
                    loss,
                });
            }
        }

        let train_accuracy = loaders
            .train_eval
            .as_ref()
            .map(|loader| evaluate(&model, loader.as_ref(), Split::Train))
            .transpose()?;
        let test_accuracy = evaluate(&model, loaders.test.as_ref(), Split::Test)?;

        observer.on_event(&TrainingEvent::EpochCompleted {
            epoch,
            num_epochs: config.num_epochs,
            train_accuracy,
            test_accuracy,
        });

        if test_accuracy >= config.target_accuracy {
            log::info!(
                "Test accuracy {test_accuracy:.2}% reached the {}% target after epoch {}",
                config.target_accuracy,
                epoch + 1
            );
            observer.on_event(&TrainingEvent::TargetReached {
                target: config.target_accuracy,
            });

            return Ok(TrainingOutcome {
                model,
                stop: StopReason::TargetReached,
                epochs_completed: epoch + 1,
                steps,
            });
        }
    }

    log::info!("All {} epochs completed", config.num_epochs);

    Ok(TrainingOutcome {
        model,
        stop: StopReason::EpochsExhausted,
        epochs_completed: config.num_epochs,
        steps,
    })
}

/// One gradient-descent update. Returns the updated model and the batch loss.
fn step<B, O>(
    model: Model<B>,
    optim: &mut O,
    loss_fn: &CrossEntropyLoss<B>,
    batch: MnistBatch<B>,
    learning_rate: f64,
) -> (Model<B>, f64)
where
    B: AutodiffBackend,
    O: Optimizer<Model<B>, B>,
{
    let output = model.forward(batch.images, Mode::Train);
    let loss = loss_fn.forward(output, batch.targets);
    let loss_value = loss.clone().into_scalar().elem::<f64>();

    // Gradients for the current backward pass, linked to each parameter of the model.
    let grads = GradientsParams::from_grads(loss.backward(), &model);

    (optim.step(learning_rate, model, grads), loss_value)
}

/// Trains on MNIST and writes `config.json` and the model record into `artifact_dir`.
pub fn run<B: AutodiffBackend>(
    device: B::Device,
    config: TrainingConfig,
    artifact_dir: &Path,
    observer: &mut dyn TrainingObserver,
) -> error::Result<TrainingOutcome<B>> {
    config.check()?;
    std::fs::create_dir_all(artifact_dir)?;
    config.save(artifact_dir.join(CONFIG_FILE))?;

    B::seed(config.seed);

    let model = config.model.init::<B>(&device);
    log::info!("Initialized model with {} parameters", model.num_params());

    let loaders =
        MnistLoaders::<B>::new(MnistDataset::train(), MnistDataset::test(), &config, &device);

    let outcome = train(model, &loaders, &config, &device, observer)?;
    log::info!(
        "Training stopped ({:?}) after {} epochs and {} steps",
        outcome.stop,
        outcome.epochs_completed,
        outcome.steps
    );

    persistence::save_model(&outcome.model, &artifact_dir.join(MODEL_FILE))?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::tests::{banded_items, dataset},
        data::MnistBatcher,
        tests::{seeded, TestAutodiffBackend},
    };
    use burn::{data::dataloader::batcher::Batcher, module::AutodiffModule};

    type B = TestAutodiffBackend;

    fn config(batch_size: usize) -> TrainingConfig {
        TrainingConfig::standard().with_batch_size(batch_size)
    }

    fn loaders(train_items: usize, test_items: usize, config: &TrainingConfig) -> MnistLoaders<B> {
        MnistLoaders::new(
            dataset(train_items),
            dataset(test_items),
            config,
            &Default::default(),
        )
    }

    /// Eval-mode logits over a fixed batch, used to compare parameters.
    fn logits(model: &Model<B>) -> Vec<f32> {
        let device = Default::default();
        let model = model.valid();
        let batch: MnistBatch<<B as AutodiffBackend>::InnerBackend> =
            MnistBatcher::default().batch(banded_items(10), &device);

        model
            .forward(batch.images, Mode::Eval)
            .into_data()
            .to_vec::<f32>()
            .unwrap()
    }

    fn count<F: Fn(&TrainingEvent) -> bool>(events: &[TrainingEvent], predicate: F) -> usize {
        events.iter().filter(|event| predicate(event)).count()
    }

    #[test]
    fn config_defaults() {
        let config = TrainingConfig::standard();

        assert_eq!(config.num_epochs, 10);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.target_accuracy, 96.0);
        assert_eq!(config.learning_rate, 1e-3);
        assert_eq!(config.num_workers, None);
        assert!(config.report_train_accuracy);
        assert_eq!(config.model.dropout, 0.25);
    }

    #[test]
    fn config_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = config(32).with_num_epochs(3).with_target_accuracy(90.5);

        config.save(&path).unwrap();
        let loaded = TrainingConfig::load(&path).unwrap();

        assert_eq!(loaded.batch_size, 32);
        assert_eq!(loaded.num_epochs, 3);
        assert_eq!(loaded.target_accuracy, 90.5);
        assert_eq!(loaded.seed, config.seed);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let loaders = loaders(8, 8, &config(4));
        let config = config(0);
        let model = config.model.init::<B>(&Default::default());
        let mut events: Vec<TrainingEvent> = Vec::new();

        let result = train(model, &loaders, &config, &Default::default(), &mut events);

        assert!(matches!(result, Err(TrainError::ZeroBatchSize)));
        assert!(events.is_empty());
    }

    #[test]
    fn config_display_is_json() {
        let config = config(32).with_num_epochs(3);

        let loaded = TrainingConfig::load_binary(config.to_string().as_bytes()).unwrap();

        assert_eq!(loaded.batch_size, 32);
        assert_eq!(loaded.num_epochs, 3);
    }

    #[test]
    fn optimizer_step_updates_parameters() {
        let _guard = seeded(10);
        let device = Default::default();
        let config = config(10);
        let model = config.model.init::<B>(&device);
        let mut optim = config.optimizer.init::<B, Model<B>>();
        let loss_fn = CrossEntropyLossConfig::new().init(&device);
        let batch: MnistBatch<B> = MnistBatcher::default().batch(banded_items(10), &device);
        let before = logits(&model);

        let (model, loss) = step(model, &mut optim, &loss_fn, batch, config.learning_rate);

        assert!(loss > 0.0);
        assert_ne!(before, logits(&model));
    }

    #[test]
    fn zero_epochs_is_a_no_op() {
        let _guard = seeded(11);
        let config = config(8).with_num_epochs(0);
        let loaders = loaders(16, 8, &config);
        let model = config.model.init::<B>(&Default::default());
        let before = logits(&model);
        let mut events: Vec<TrainingEvent> = Vec::new();

        let outcome = train(model, &loaders, &config, &Default::default(), &mut events).unwrap();

        assert!(events.is_empty());
        assert_eq!(outcome.steps, 0);
        assert_eq!(outcome.epochs_completed, 0);
        assert_eq!(outcome.stop, StopReason::EpochsExhausted);
        assert_eq!(before, logits(&outcome.model));
    }

    #[test]
    fn single_batch_with_zero_target_stops_after_one_step() {
        let _guard = seeded(12);
        let config = config(64).with_num_epochs(1).with_target_accuracy(0.0);
        let loaders = loaders(64, 64, &config);
        let model = config.model.init::<B>(&Default::default());
        let mut events: Vec<TrainingEvent> = Vec::new();

        let outcome = train(model, &loaders, &config, &Default::default(), &mut events).unwrap();

        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.epochs_completed, 1);
        assert_eq!(outcome.stop, StopReason::TargetReached);
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[0],
            TrainingEvent::Progress {
                epoch: 0,
                batch: 0,
                items_seen: 0,
                items_total: 64,
                ..
            }
        ));
        assert!(matches!(
            events[1],
            TrainingEvent::EpochCompleted {
                epoch: 0,
                num_epochs: 1,
                train_accuracy: Some(_),
                ..
            }
        ));
        assert_eq!(events[2], TrainingEvent::TargetReached { target: 0.0 });
    }

    #[test]
    fn target_reached_stops_before_the_epoch_budget() {
        let _guard = seeded(13);
        let config = config(16).with_num_epochs(5).with_target_accuracy(0.0);
        let loaders = loaders(32, 16, &config);
        let model = config.model.init::<B>(&Default::default());
        let mut events: Vec<TrainingEvent> = Vec::new();

        let outcome = train(model, &loaders, &config, &Default::default(), &mut events).unwrap();

        assert_eq!(outcome.epochs_completed, 1);
        assert_eq!(outcome.steps, 2);
        let completed = count(&events, |event| {
            matches!(event, TrainingEvent::EpochCompleted { .. })
        });
        assert_eq!(completed, 1);
        if let TrainingEvent::EpochCompleted { test_accuracy, .. } = &events[events.len() - 2] {
            assert!(*test_accuracy >= config.target_accuracy);
        } else {
            panic!("expected the epoch report before the target event");
        }
    }

    #[test]
    fn unreachable_target_runs_every_epoch() {
        let _guard = seeded(14);
        let config = config(16).with_num_epochs(3).with_target_accuracy(101.0);
        let loaders = loaders(32, 16, &config);
        let model = config.model.init::<B>(&Default::default());
        let mut events: Vec<TrainingEvent> = Vec::new();

        let outcome = train(model, &loaders, &config, &Default::default(), &mut events).unwrap();

        assert_eq!(outcome.stop, StopReason::EpochsExhausted);
        assert_eq!(outcome.epochs_completed, 3);
        assert_eq!(outcome.steps, 6);
        let completed = count(&events, |event| {
            matches!(event, TrainingEvent::EpochCompleted { .. })
        });
        assert_eq!(completed, 3);
        let reached = count(&events, |event| {
            matches!(event, TrainingEvent::TargetReached { .. })
        });
        assert_eq!(reached, 0);
    }

    #[test]
    fn progress_is_reported_every_hundred_batches() {
        let _guard = seeded(15);
        let config = config(1).with_num_epochs(1).with_target_accuracy(101.0);
        let loaders = loaders(201, 10, &config);
        let model = config.model.init::<B>(&Default::default());
        let mut events: Vec<TrainingEvent> = Vec::new();

        train(model, &loaders, &config, &Default::default(), &mut events).unwrap();

        let progress: Vec<(usize, usize, f64)> = events
            .iter()
            .filter_map(|event| match event {
                TrainingEvent::Progress {
                    batch,
                    items_seen,
                    percent,
                    ..
                } => Some((*batch, *items_seen, *percent)),
                _ => None,
            })
            .collect();

        assert_eq!(progress.len(), 3);
        assert_eq!(progress[1].0, 100);
        assert_eq!(progress[2].1, 200);
        assert!((progress[1].2 - 100.0 * 100.0 / 201.0).abs() < 1e-9);
    }

    #[test]
    fn train_accuracy_can_be_skipped() {
        let _guard = seeded(16);
        let config = config(16)
            .with_num_epochs(1)
            .with_report_train_accuracy(false);
        let loaders = loaders(16, 16, &config);
        let model = config.model.init::<B>(&Default::default());
        let mut events: Vec<TrainingEvent> = Vec::new();

        train(model, &loaders, &config, &Default::default(), &mut events).unwrap();

        assert!(events.iter().any(|event| matches!(
            event,
            TrainingEvent::EpochCompleted {
                train_accuracy: None,
                ..
            }
        )));
    }

    #[test]
    fn training_is_deterministic_under_a_fixed_seed() {
        let config = config(8).with_num_epochs(2).with_target_accuracy(101.0);

        let run = || {
            let _guard = seeded(config.seed);
            let model = config.model.init::<B>(&Default::default());
            let loaders = loaders(24, 8, &config);
            let mut events: Vec<TrainingEvent> = Vec::new();
            let outcome =
                train(model, &loaders, &config, &Default::default(), &mut events).unwrap();
            logits(&outcome.model)
        };

        let first = run();
        let second = run();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert!((a - b).abs() <= 1e-5, "{a} != {b}");
        }
    }
}
