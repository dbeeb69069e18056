//! # Fxsim Core
//!
//! A co-simulation driver for a clocked audio-effects FPGA.
//!
//! This library provides:
//! - A two-phase clock stepper around a pluggable device model
//! - A deadline-keyed queue of command batches, delivered one byte per
//!   sample over a bit-serial link with retry
//! - A sample pump that feeds a test tone or recorded audio to the device
//!   and collects its output
//! - Optional cross-validation against a reference software emulator
//!
//! ## Architecture
//!
//! - [`device`] - Pin snapshot, testbench IO and the behavioral FPGA model
//! - [`program`] - Effect descriptors, programs and their command bytes
//! - [`emulator`] - Reference model used for cross-validation
//! - [`driver`] - Clock stepper, send queue, sample pump, trace and stats
//! - [`audio`] - WAV I/O and stimulus generation
//! - [`config`] - TOML run configuration
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=debug fxsim input.wav output.wav --cross-validate --trace
//! ```
//!
//! ## Timing
//!
//! One tick is a full system clock period. The model is evaluated once with
//! the clock high and once with it low. The device strobes `frame` once per
//! sample period; the driver answers each strobe with exactly one input
//! sample and at most one command byte, so command bytes travel at one per
//! sample and the sample clock counts strobes.

use std::path::{Path, PathBuf};

pub mod audio;
pub mod config;
pub mod device;
pub mod driver;
pub mod emulator;
pub mod error;
pub mod program;

// Re-export main types for convenience
pub use config::Config;
pub use driver::{Driver, RunOutput};
pub use error::{FxsimError, Result};

/// Suffix appended to the output path for the emulator's predicted stream
pub const EMULATED_SUFFIX: &str = ".em.wav";

/// Where the emulator's predicted stream is written for a given output.
pub fn emulated_path(output: &Path) -> PathBuf {
    let mut path = output.as_os_str().to_owned();
    path.push(EMULATED_SUFFIX);
    PathBuf::from(path)
}
