use std::process::ExitCode;

use clap::Parser;
use digit_trainer::{
    cli::Args,
    device,
    event::ConsoleObserver,
    logging::{self, LOG_FILE},
};

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = logging::install_file_logger(&args.artifact_dir.join(LOG_FILE)) {
        eprintln!("error: cannot open the training log: {err}");
        return ExitCode::FAILURE;
    }

    let config = args.training_config();
    log::info!("Starting training with {config}");

    match device::run(
        args.device(),
        config,
        &args.artifact_dir,
        &mut ConsoleObserver,
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("Training failed: {err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
