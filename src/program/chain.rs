//! Fixed-point effect chain that executes a [`Program`].
//!
//! The arithmetic is integer-only so that the device model and the
//! reference emulator produce identical samples for identical inputs.

use super::{Program, Stage};

/// A delay line with Q0.8 mix and feedback.
#[derive(Debug, Clone)]
struct DelayLine {
    /// Ring buffer for storing samples
    buffer: Vec<i16>,
    /// Current write position in the buffer
    write_pos: usize,
    /// Wet mix (0 = dry only, 256 would be wet only)
    mix: i32,
    /// Feedback amount fed back into the buffer
    feedback: i32,
}

impl DelayLine {
    fn new(samples: u16, mix: u8, feedback: u8) -> Self {
        Self {
            buffer: vec![0; samples as usize],
            write_pos: 0,
            mix: mix as i32,
            feedback: feedback as i32,
        }
    }

    fn process(&mut self, input: i16) -> i16 {
        if self.buffer.is_empty() {
            return input;
        }

        let delayed = self.buffer[self.write_pos] as i32;
        let x = input as i32;

        self.buffer[self.write_pos] = saturate(x + ((delayed * self.feedback) >> 8));
        self.write_pos = (self.write_pos + 1) % self.buffer.len();

        saturate((x * (256 - self.mix) + delayed * self.mix) >> 8)
    }
}

#[derive(Debug, Clone)]
enum StageState {
    Gain(i32),
    Delay(DelayLine),
}

/// Runtime state for a loaded program.
///
/// An empty chain passes samples through unchanged.
#[derive(Debug, Clone, Default)]
pub struct EffectChain {
    stages: Vec<StageState>,
}

impl EffectChain {
    /// Instantiate a program with cleared delay buffers.
    pub fn new(program: &Program) -> Self {
        let stages = program
            .stages
            .iter()
            .map(|stage| match *stage {
                Stage::Gain { level } => StageState::Gain(level as i32),
                Stage::Delay {
                    samples,
                    mix,
                    feedback,
                } => StageState::Delay(DelayLine::new(samples, mix, feedback)),
            })
            .collect();
        Self { stages }
    }

    /// Process one sample through every stage in order.
    pub fn process(&mut self, input: i16) -> i16 {
        self.stages.iter_mut().fold(input, |x, stage| match stage {
            StageState::Gain(level) => saturate((x as i32 * *level) >> 8),
            StageState::Delay(delay) => delay.process(x),
        })
    }
}

fn saturate(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_chain_passthrough() {
        let mut chain = EffectChain::default();
        for x in [0, 1, -1, i16::MAX, i16::MIN] {
            assert_eq!(chain.process(x), x);
        }
    }

    #[test]
    fn test_gain_saturates() {
        let mut chain = EffectChain::new(&Program::new(vec![Stage::Gain { level: 512 }]));
        assert_eq!(chain.process(1000), 2000);
        assert_eq!(chain.process(30000), i16::MAX);
        assert_eq!(chain.process(-30000), i16::MIN);

        let mut half = EffectChain::new(&Program::new(vec![Stage::Gain { level: 128 }]));
        assert_eq!(half.process(1000), 500);
    }

    #[test]
    fn test_delay_wet_only() {
        // mix=255 leaves 1/256 of the dry signal; use zero input after the impulse
        let mut chain = EffectChain::new(&Program::new(vec![Stage::Delay {
            samples: 4,
            mix: 255,
            feedback: 0,
        }]));

        let first = chain.process(2560);
        assert_eq!(first, 10); // 2560 * 1 / 256

        for _ in 0..3 {
            assert_eq!(chain.process(0), 0);
        }

        // 2560 * 255 / 256
        assert_eq!(chain.process(0), 2550);
        assert_eq!(chain.process(0), 0);
    }

    #[test]
    fn test_delay_feedback_repeats() {
        let mut chain = EffectChain::new(&Program::new(vec![Stage::Delay {
            samples: 2,
            mix: 128,
            feedback: 128,
        }]));

        assert_eq!(chain.process(1024), 512);
        assert_eq!(chain.process(0), 0);
        // First echo: delayed 1024, half mix
        assert_eq!(chain.process(0), 512);
        assert_eq!(chain.process(0), 0);
        // Second echo: fed back at half level
        assert_eq!(chain.process(0), 256);
    }
}
