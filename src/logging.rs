use std::{io, path::Path};

use tracing_core::LevelFilter;
use tracing_subscriber::{filter::Targets, prelude::*, registry};

/// Name of the experiment log inside the artifact directory.
pub const LOG_FILE: &str = "train.log";

/// Graphics crates that only log useful records at warning level and above.
const QUIET_TARGETS: [&str; 3] = ["wgpu", "naga", "cubecl"];

/// Sends log records to `file_path`, creating its directory, and reports
/// panics with the log location. Does nothing when a global subscriber is
/// already installed.
pub fn install_file_logger(file_path: &Path) -> io::Result<()> {
    let directory = match file_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = file_path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("the log path '{}' does not name a file", file_path.display()),
        )
    })?;
    std::fs::create_dir_all(directory)?;

    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(tracing_appender::rolling::never(directory, file_name))
        .with_filter(log_targets());

    if registry().with(layer).try_init().is_ok() {
        report_panics_to(file_path);
    }

    Ok(())
}

fn log_targets() -> Targets {
    QUIET_TARGETS.iter().fold(
        Targets::new().with_default(LevelFilter::INFO),
        |targets, target| targets.with_target(*target, LevelFilter::WARN),
    )
}

fn report_panics_to(file_path: &Path) {
    let previous = std::panic::take_hook();
    let file_path = file_path.display().to_string();

    std::panic::set_hook(Box::new(move |info| {
        log::error!("Training panicked: {info}");
        eprintln!("training panicked, see '{file_path}' for the run log");
        previous(info);
    }));
}
