//! Run configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the standard run: test tone in, 2048 samples, delay effect at sample 70,
//! no trace, no cross-validation.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::audio::{Stimulus, DEFAULT_TONE_AMPLITUDE, DEFAULT_TONE_FREQUENCY};
use crate::error::{FxsimError, Result};

const DEFAULT_SAMPLE_LIMIT: usize = 2048;
const DEFAULT_LATENCY: usize = 3;
const DEFAULT_TOLERANCE: f64 = 0.01;
const DEFAULT_WARMUP_TICKS: u32 = 16;
const DEFAULT_MAX_PENDING: usize = 64;
const DEFAULT_PROGRESS_INTERVAL: u64 = 128;
const DEFAULT_STALL_TICKS: u64 = 1_000_000;

const DEFAULT_CLOCKS_PER_SAMPLE: u32 = 64;
const DEFAULT_PIPELINE_DEPTH: usize = 2;
/// `frame` needs a low clock between strobes to produce a rising edge.
pub const MIN_CLOCKS_PER_SAMPLE: u32 = 2;

const DEFAULT_EFFECT_PATH: &str = "eff/del.eff";
const DEFAULT_EFFECT_DEADLINE: u64 = 70;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub stimulus: StimulusConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default = "default_effects")]
    pub effects: Vec<EffectEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver: DriverConfig::default(),
            stimulus: StimulusConfig::default(),
            device: DeviceConfig::default(),
            effects: default_effects(),
        }
    }
}

impl Config {
    /// Parse configuration text. `path` is used in error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| FxsimError::ConfigParse {
            path: path.display().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| FxsimError::ConfigRead {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    pub fn validate(&self) -> Result<()> {
        let driver = &self.driver;
        if !(driver.tolerance.is_finite() && driver.tolerance > 0.0) {
            return Err(FxsimError::invalid_config("driver.tolerance must be positive"));
        }
        if driver.max_pending == 0 {
            return Err(FxsimError::invalid_config("driver.max_pending must be at least 1"));
        }
        if driver.progress_interval == 0 {
            return Err(FxsimError::invalid_config("driver.progress_interval must be at least 1"));
        }
        if driver.stall_ticks == 0 {
            return Err(FxsimError::invalid_config("driver.stall_ticks must be at least 1"));
        }
        if self.device.clocks_per_sample < MIN_CLOCKS_PER_SAMPLE {
            return Err(FxsimError::invalid_config(format!(
                "device.clocks_per_sample must be at least {}",
                MIN_CLOCKS_PER_SAMPLE
            )));
        }
        if !(0.0..=1.0).contains(&self.stimulus.amplitude) {
            return Err(FxsimError::invalid_config("stimulus.amplitude must be within 0..=1"));
        }
        if !(self.stimulus.frequency.is_finite() && self.stimulus.frequency > 0.0) {
            return Err(FxsimError::invalid_config("stimulus.frequency must be positive"));
        }
        Ok(())
    }
}

/// Co-simulation driver options.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    /// Dump a VCD waveform of every half clock period
    #[serde(default)]
    pub trace: bool,

    #[serde(default = "default_trace_path")]
    pub trace_path: PathBuf,

    /// Compare every device sample against the reference emulator
    #[serde(default)]
    pub cross_validate: bool,

    /// Hard cap on processed samples
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,

    /// Device latency in samples used to align emulator input
    #[serde(default = "default_latency")]
    pub latency: usize,

    /// Mismatch threshold as a fraction of full scale
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Clock ticks with reset held before the run
    #[serde(default = "default_warmup_ticks")]
    pub warmup_ticks: u32,

    /// Maximum batches waiting in the send queue
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Samples between progress log lines
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Ticks without a ready strobe before the run is abandoned
    #[serde(default = "default_stall_ticks")]
    pub stall_ticks: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            trace: false,
            trace_path: default_trace_path(),
            cross_validate: false,
            sample_limit: default_sample_limit(),
            latency: default_latency(),
            tolerance: default_tolerance(),
            warmup_ticks: default_warmup_ticks(),
            max_pending: default_max_pending(),
            progress_interval: default_progress_interval(),
            stall_ticks: default_stall_ticks(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StimulusSource {
    #[default]
    Tone,
    Input,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StimulusConfig {
    #[serde(default)]
    pub source: StimulusSource,

    #[serde(default = "default_frequency")]
    pub frequency: f64,

    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            source: StimulusSource::Tone,
            frequency: default_frequency(),
            amplitude: default_amplitude(),
        }
    }
}

impl StimulusConfig {
    /// Build the stimulus, taking samples from `input` when configured to.
    pub fn build(&self, input: &[i16]) -> Stimulus {
        match self.source {
            StimulusSource::Tone => Stimulus::Tone {
                frequency: self.frequency,
                amplitude: self.amplitude,
            },
            StimulusSource::Input => Stimulus::Stream(input.to_vec()),
        }
    }
}

/// Behavioral device model parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_clocks_per_sample")]
    pub clocks_per_sample: u32,

    #[serde(default = "default_pipeline_depth")]
    pub pipeline_depth: usize,

    /// Clocks the device stays busy after applying a program
    #[serde(default)]
    pub reconfig_ticks: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            clocks_per_sample: default_clocks_per_sample(),
            pipeline_depth: default_pipeline_depth(),
            reconfig_ticks: 0,
        }
    }
}

/// An effect descriptor to compile and schedule.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EffectEntry {
    pub path: PathBuf,
    /// Sample clock value at which the transfer may start
    #[serde(default)]
    pub deadline: u64,
}

fn default_trace_path() -> PathBuf {
    PathBuf::from("waveform.vcd")
}

fn default_sample_limit() -> usize {
    DEFAULT_SAMPLE_LIMIT
}

fn default_latency() -> usize {
    DEFAULT_LATENCY
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_warmup_ticks() -> u32 {
    DEFAULT_WARMUP_TICKS
}

fn default_max_pending() -> usize {
    DEFAULT_MAX_PENDING
}

fn default_progress_interval() -> u64 {
    DEFAULT_PROGRESS_INTERVAL
}

fn default_stall_ticks() -> u64 {
    DEFAULT_STALL_TICKS
}

fn default_frequency() -> f64 {
    DEFAULT_TONE_FREQUENCY
}

fn default_amplitude() -> f64 {
    DEFAULT_TONE_AMPLITUDE
}

fn default_clocks_per_sample() -> u32 {
    DEFAULT_CLOCKS_PER_SAMPLE
}

fn default_pipeline_depth() -> usize {
    DEFAULT_PIPELINE_DEPTH
}

fn default_effects() -> Vec<EffectEntry> {
    vec![EffectEntry {
        path: PathBuf::from(DEFAULT_EFFECT_PATH),
        deadline: DEFAULT_EFFECT_DEADLINE,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_config_defaults() {
        let config = Config::parse("", Path::new("empty.toml")).unwrap();
        assert!(!config.driver.trace);
        assert!(!config.driver.cross_validate);
        assert_eq!(config.driver.sample_limit, 2048);
        assert_eq!(config.driver.latency, 3);
        assert_relative_eq!(config.driver.tolerance, 0.01);
        assert_eq!(config.device.clocks_per_sample, 64);
        assert_eq!(config.stimulus.source, StimulusSource::Tone);
        assert_eq!(
            config.effects,
            vec![EffectEntry {
                path: PathBuf::from("eff/del.eff"),
                deadline: 70,
            }]
        );
    }

    #[test]
    fn test_overrides() {
        let text = r#"
            [driver]
            trace = true
            cross_validate = true
            sample_limit = 100

            [stimulus]
            source = "input"

            [device]
            reconfig_ticks = 12

            [[effects]]
            path = "eff/gain.eff"
            deadline = 5

            [[effects]]
            path = "eff/lpf.eff"
        "#;
        let config = Config::parse(text, Path::new("run.toml")).unwrap();
        assert!(config.driver.trace);
        assert!(config.driver.cross_validate);
        assert_eq!(config.driver.sample_limit, 100);
        assert_eq!(config.driver.warmup_ticks, 16);
        assert_eq!(config.device.reconfig_ticks, 12);
        assert_eq!(config.effects.len(), 2);
        assert_eq!(config.effects[1].deadline, 0);

        let stimulus = config.stimulus.build(&[1, 2, 3]);
        assert_eq!(stimulus, Stimulus::Stream(vec![1, 2, 3]));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let result = Config::parse("[device]\nclocks_per_sample = 0\n", Path::new("bad.toml"));
        assert!(matches!(result, Err(FxsimError::InvalidConfig { .. })));

        let result = Config::parse("[device]\nclocks_per_sample = 1\n", Path::new("bad.toml"));
        assert!(matches!(result, Err(FxsimError::InvalidConfig { .. })));
        let config = Config::parse("[device]\nclocks_per_sample = 2\n", Path::new("ok.toml")).unwrap();
        assert_eq!(config.device.clocks_per_sample, 2);

        let result = Config::parse("[stimulus]\namplitude = 1.5\n", Path::new("bad.toml"));
        assert!(matches!(result, Err(FxsimError::InvalidConfig { .. })));

        let result = Config::parse("[driver]\ntrace = 3\n", Path::new("bad.toml"));
        assert!(matches!(result, Err(FxsimError::ConfigParse { .. })));
    }

    #[test]
    fn test_bundled_config() {
        let config = Config::parse(include_str!("../configs/fxsim.toml"), Path::new("fxsim.toml")).unwrap();
        assert!(config.driver.cross_validate);
        assert_eq!(config.effects.len(), 2);
        assert_eq!(config.effects[1].path, PathBuf::from("eff/gain.eff"));
    }
}
