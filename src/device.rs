use std::path::Path;

use burn::backend::{
    ndarray::{NdArray, NdArrayDevice},
    Autodiff,
};

use crate::{
    error::Result,
    event::TrainingObserver,
    training::{self, TrainingConfig},
};

/// Where the tensor arithmetic runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceChoice {
    /// Host CPU through the ndarray backend.
    Cpu,
    /// Best available GPU adapter through the wgpu backend.
    Accelerator,
}

impl DeviceChoice {
    pub fn from_cpu_flag(force_cpu: bool) -> Self {
        if force_cpu {
            DeviceChoice::Cpu
        } else {
            DeviceChoice::Accelerator
        }
    }
}

/// Runs a full training session on the backend matching `choice`.
///
/// There is no fallback: requesting an accelerator in a build without one fails.
pub fn run(
    choice: DeviceChoice,
    config: TrainingConfig,
    artifact_dir: &Path,
    observer: &mut dyn TrainingObserver,
) -> Result<()> {
    match choice {
        DeviceChoice::Cpu => {
            let device = NdArrayDevice::Cpu;
            announce(&device);
            training::run::<Autodiff<NdArray>>(device, config, artifact_dir, observer)?;
            Ok(())
        }
        DeviceChoice::Accelerator => run_accelerator(config, artifact_dir, observer),
    }
}

#[cfg(feature = "wgpu")]
fn run_accelerator(
    config: TrainingConfig,
    artifact_dir: &Path,
    observer: &mut dyn TrainingObserver,
) -> Result<()> {
    use burn::backend::{wgpu::WgpuDevice, Wgpu};

    let device = WgpuDevice::default();
    announce(&device);
    training::run::<Autodiff<Wgpu>>(device, config, artifact_dir, observer)?;

    Ok(())
}

#[cfg(not(feature = "wgpu"))]
fn run_accelerator(
    _config: TrainingConfig,
    _artifact_dir: &Path,
    _observer: &mut dyn TrainingObserver,
) -> Result<()> {
    Err(crate::error::TrainError::AcceleratorUnavailable)
}

fn announce<D: std::fmt::Debug>(device: &D) {
    log::info!("Selected device {device:?}");
    println!("Using device: {device:?}");
}
