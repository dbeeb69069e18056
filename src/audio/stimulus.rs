//! Input stimulus presented to the device's sample pin.

use std::f64::consts::TAU;

/// Default test tone frequency in Hz.
pub const DEFAULT_TONE_FREQUENCY: f64 = 1500.0;

/// Default test tone amplitude as a fraction of full scale.
pub const DEFAULT_TONE_AMPLITUDE: f64 = 0.5;

/// Source of input samples, one per ready cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Stimulus {
    /// Deterministic sine wave evaluated at the logical sample time
    Tone { frequency: f64, amplitude: f64 },
    /// Samples from a decoded input stream
    Stream(Vec<i16>),
}

impl Default for Stimulus {
    fn default() -> Self {
        Self::Tone {
            frequency: DEFAULT_TONE_FREQUENCY,
            amplitude: DEFAULT_TONE_AMPLITUDE,
        }
    }
}

impl Stimulus {
    /// Number of samples available, or `None` for an unbounded tone.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Tone { .. } => None,
            Self::Stream(samples) => Some(samples.len()),
        }
    }

    /// Input for sample number `index` (1-based) at logical time `time` seconds.
    ///
    /// A stream past its end yields silence.
    pub fn sample(&self, index: u64, time: f64) -> i16 {
        match self {
            Self::Tone {
                frequency,
                amplitude,
            } => ((TAU * frequency * time).sin() * 32767.0 * amplitude).round() as i16,
            Self::Stream(samples) => index
                .checked_sub(1)
                .and_then(|i| samples.get(i as usize))
                .copied()
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tone_quarter_period() {
        let tone = Stimulus::Tone {
            frequency: 1000.0,
            amplitude: 0.5,
        };
        assert_eq!(tone.sample(1, 0.0), 0);
        // Peak at a quarter period
        assert_eq!(tone.sample(1, 0.00025), 16384);
        assert_eq!(tone.sample(1, 0.00075), -16384);
        assert_eq!(tone.len(), None);
    }

    #[test]
    fn test_default_tone() {
        let Stimulus::Tone {
            frequency,
            amplitude,
        } = Stimulus::default()
        else {
            panic!("default stimulus should be a tone");
        };
        assert_relative_eq!(frequency, 1500.0);
        assert_relative_eq!(amplitude, 0.5);
    }

    #[test]
    fn test_stream_indexing() {
        let stream = Stimulus::Stream(vec![10, 20, 30]);
        assert_eq!(stream.len(), Some(3));
        assert_eq!(stream.sample(1, 0.0), 10);
        assert_eq!(stream.sample(3, 0.0), 30);
        assert_eq!(stream.sample(4, 0.0), 0);
        assert_eq!(stream.sample(0, 0.0), 0);
    }
}
