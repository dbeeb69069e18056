//! Cross-validation of device output against the reference emulator.

use std::collections::VecDeque;

use log::warn;

use crate::audio::FULL_SCALE;
use crate::emulator::Emulator;
use crate::program::Batch;

/// A sample where device and emulator disagree beyond tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mismatch {
    /// Sample clock value of the offending sample
    pub sample: u64,
    pub actual: i16,
    pub predicted: i16,
    /// |predicted - actual| as a fraction of full scale
    pub deviation: f64,
}

/// Feeds latency-aligned input to an emulator and compares its output.
pub struct CrossValidator {
    emulator: Box<dyn Emulator>,
    latency: usize,
    tolerance: f64,
    /// Most recent inputs, oldest first; starts with the pin's reset value
    history: VecDeque<i16>,
    predicted: Vec<i16>,
    mismatches: Vec<Mismatch>,
}

impl CrossValidator {
    pub fn new(emulator: Box<dyn Emulator>, latency: usize, tolerance: f64) -> Self {
        let mut history = VecDeque::with_capacity(latency + 2);
        history.push_back(0);
        Self {
            emulator,
            latency,
            tolerance,
            history,
            predicted: Vec::new(),
            mismatches: Vec::new(),
        }
    }

    pub fn apply_batch(&mut self, batch: &Batch) {
        self.emulator.apply_batch(batch);
    }

    /// Record sample `n` (the post-increment sample clock) with the input
    /// presented on that cycle and the output captured from the device.
    pub fn observe(&mut self, n: u64, input: i16, actual: i16) -> Option<Mismatch> {
        self.history.push_back(input);
        if self.history.len() > self.latency + 1 {
            self.history.pop_front();
        }

        if n < self.latency as u64 {
            self.predicted.push(0);
            return None;
        }

        let aligned = self.history.front().copied().unwrap_or(0);
        let predicted = self.emulator.process_sample(aligned);
        self.predicted.push(predicted);

        let deviation = (predicted as f64 - actual as f64).abs() / FULL_SCALE;
        if deviation <= self.tolerance {
            return None;
        }

        let mismatch = Mismatch {
            sample: n,
            actual,
            predicted,
            deviation,
        };
        warn!(
            "simulation mismatch of {:.2}% at sample {}: device {}, emulator {}",
            deviation * 100.0,
            n,
            actual,
            predicted
        );
        self.mismatches.push(mismatch);
        Some(mismatch)
    }

    /// Predicted stream, one entry per observed sample.
    pub fn predicted(&self) -> &[i16] {
        &self.predicted
    }

    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    pub fn into_parts(self) -> (Vec<i16>, Vec<Mismatch>) {
        (self.predicted, self.mismatches)
    }
}
