//! Reference software model of the device.
//!
//! The driver mirrors every batch into the emulator at the moment its
//! transfer starts and asks it for one predicted sample per accepted
//! device sample.

use log::warn;

use crate::program::{Batch, EffectChain, Program};

/// A deterministic reference model.
pub trait Emulator {
    /// Mirror a configuration batch that is being applied to the device.
    fn apply_batch(&mut self, batch: &Batch);

    /// Predict the output for one input sample.
    fn process_sample(&mut self, input: i16) -> i16;
}

/// Emulator that decodes batches into an [`EffectChain`].
#[derive(Debug, Clone, Default)]
pub struct ProgramEmulator {
    chain: EffectChain,
    programs_applied: usize,
}

impl ProgramEmulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches successfully decoded and applied.
    pub fn programs_applied(&self) -> usize {
        self.programs_applied
    }
}

impl Emulator for ProgramEmulator {
    fn apply_batch(&mut self, batch: &Batch) {
        match Program::decode(batch.as_bytes()) {
            Ok(program) => {
                self.chain = EffectChain::new(&program);
                self.programs_applied += 1;
            }
            Err(e) => warn!("emulator ignored batch {}: {}", batch, e),
        }
    }

    fn process_sample(&mut self, input: i16) -> i16 {
        self.chain.process(input)
    }
}
