//! Audio I/O for the co-simulation.
//!
//! Reads and writes mono 16-bit PCM WAV files and generates the input
//! stimulus fed to the device one sample per ready cycle.

mod stimulus;

pub use stimulus::{Stimulus, DEFAULT_TONE_AMPLITUDE, DEFAULT_TONE_FREQUENCY};

use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{FxsimError, Result};

/// Full-scale magnitude of a 16-bit sample.
pub const FULL_SCALE: f64 = 32768.0;

/// A decoded mono 16-bit audio clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Signed 16-bit samples
    pub samples: Vec<i16>,
}

impl AudioClip {
    pub fn new(sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// Read a WAV file, rejecting anything but mono 16-bit PCM.
    pub fn read(path: &Path) -> Result<Self> {
        let name = path.display().to_string();
        let file = File::open(path).map_err(|e| FxsimError::AudioRead {
            path: name.clone(),
            source: hound::Error::IoError(e),
        })?;
        Self::read_from(BufReader::new(file), &name)
    }

    /// Decode a WAV stream. `name` is used in error messages.
    pub fn read_from<R: Read>(reader: R, name: &str) -> Result<Self> {
        let read_err = |e| FxsimError::AudioRead {
            path: name.to_string(),
            source: e,
        };

        let reader = WavReader::new(reader).map_err(read_err)?;
        let spec = reader.spec();

        if spec.sample_format != SampleFormat::Int {
            return Err(FxsimError::unsupported_audio(name, "not integer PCM"));
        }
        if spec.channels != 1 {
            return Err(FxsimError::unsupported_audio(
                name,
                format!("{} channels, expected mono", spec.channels),
            ));
        }
        if spec.bits_per_sample != 16 {
            return Err(FxsimError::unsupported_audio(
                name,
                format!("{} bits per sample, expected 16", spec.bits_per_sample),
            ));
        }

        let samples = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(read_err)?;

        Ok(Self::new(spec.sample_rate, samples))
    }

    /// Write as a canonical mono 16-bit PCM WAV file.
    pub fn write(&self, path: &Path) -> Result<()> {
        let write_err = |e| FxsimError::AudioWrite {
            path: path.display().to_string(),
            source: e,
        };

        let mut writer = WavWriter::create(path, wav_spec(self.sample_rate)).map_err(write_err)?;
        for &sample in &self.samples {
            writer.write_sample(sample).map_err(write_err)?;
        }
        writer.finalize().map_err(write_err)
    }

    /// Encode into any seekable sink.
    pub fn write_to<W: Write + Seek>(&self, sink: W, name: &str) -> Result<()> {
        let write_err = |e| FxsimError::AudioWrite {
            path: name.to_string(),
            source: e,
        };

        let mut writer = WavWriter::new(sink, wav_spec(self.sample_rate)).map_err(write_err)?;
        for &sample in &self.samples {
            writer.write_sample(sample).map_err(write_err)?;
        }
        writer.finalize().map_err(write_err)
    }
}

fn wav_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}
