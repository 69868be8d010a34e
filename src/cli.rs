use std::path::PathBuf;

use clap::Parser;

use crate::{device::DeviceChoice, training::TrainingConfig};

/// Trains a convolutional MNIST classifier until it reaches a target accuracy.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Force CPU usage
    #[arg(long)]
    pub cpu: bool,
    /// Number of epochs
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,
    /// Batch size
    #[arg(long, default_value_t = 64, value_parser = parse_batch_size)]
    pub batch_size: usize,
    /// Target test accuracy to achieve, in percent
    #[arg(long, default_value_t = 96.0, value_parser = parse_percentage)]
    pub target_accuracy: f64,
    /// Seed for weight initialization, dropout and shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Data loading threads
    #[arg(long)]
    pub num_workers: Option<usize>,
    /// Directory receiving the model, its configuration and the training log
    #[arg(long, default_value = ".")]
    pub artifact_dir: PathBuf,
    /// Skip the per-epoch evaluation of the training set
    #[arg(long)]
    pub no_train_accuracy: bool,
}

impl Args {
    pub fn device(&self) -> DeviceChoice {
        DeviceChoice::from_cpu_flag(self.cpu)
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig::standard()
            .with_num_epochs(self.epochs)
            .with_batch_size(self.batch_size)
            .with_target_accuracy(self.target_accuracy)
            .with_seed(self.seed)
            .with_num_workers(self.num_workers)
            .with_report_train_accuracy(!self.no_train_accuracy)
    }
}

fn parse_batch_size(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("the batch size must be at least 1".to_string()),
        Ok(size) => Ok(size),
        Err(err) => Err(err.to_string()),
    }
}

fn parse_percentage(value: &str) -> Result<f64, String> {
    let percentage: f64 = value.parse().map_err(|err| format!("{err}"))?;

    if percentage.is_finite() && (0.0..=100.0).contains(&percentage) {
        Ok(percentage)
    } else {
        Err(format!("{value} is not a percentage between 0 and 100"))
    }
}
