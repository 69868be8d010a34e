#![recursion_limit = "256"]

//! Trains a small convolutional classifier on MNIST until a target test
//! accuracy is reached or the epoch budget runs out.

pub mod cli;
pub mod data;
pub mod device;
pub mod error;
pub mod evaluation;
pub mod event;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod training;

pub use error::{Result, TrainError};
