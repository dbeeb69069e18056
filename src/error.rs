//! Error types for the fxsim co-simulator.
//!
//! This module provides a unified error type [`FxsimError`] that covers
//! every boundary failure the co-simulation can hit: audio file I/O,
//! configuration and effect loading, and send-queue resource exhaustion.
//! Transient protocol rejections and model divergence are not errors; the
//! driver handles those locally.

use thiserror::Error;

/// Result type alias using [`FxsimError`].
pub type Result<T> = std::result::Result<T, FxsimError>;

/// Unified error type for all fxsim operations.
#[derive(Error, Debug)]
pub enum FxsimError {
    // ============ Audio Errors ============
    /// Audio file could not be opened or decoded
    #[error("Failed to read audio file '{path}': {source}")]
    AudioRead {
        path: String,
        #[source]
        source: hound::Error,
    },

    /// Audio file decoded but is not mono 16-bit PCM
    #[error("Unsupported audio format in '{path}': {reason}")]
    UnsupportedAudio { path: String, reason: String },

    /// Audio file could not be written
    #[error("Failed to write audio file '{path}': {source}")]
    AudioWrite {
        path: String,
        #[source]
        source: hound::Error,
    },

    // ============ Configuration Errors ============
    /// Error reading a configuration file
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`crate::config::Config`]
    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration value out of range
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ============ Program Errors ============
    /// Error reading an effect descriptor
    #[error("Failed to read effect descriptor '{path}': {source}")]
    EffectRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Effect descriptor is malformed
    #[error("Failed to parse effect descriptor '{path}': {source}")]
    EffectParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Command bytes do not form a valid program
    #[error("Invalid program at byte {offset}: {message}")]
    InvalidProgram { offset: usize, message: String },

    // ============ Driver Errors ============
    /// Send queue reached its configured capacity
    #[error("Send queue is full ({capacity} pending batches)")]
    QueueFull { capacity: usize },

    /// Storage for a new send queue entry could not be reserved
    #[error("Failed to allocate send queue entry")]
    QueueAllocation,

    /// Device stopped signalling ready
    #[error("Device stalled at sample {sample}: no ready strobe for {ticks} ticks")]
    DeviceStalled { sample: u64, ticks: u64 },

    /// Error opening or writing the waveform trace
    #[error("Waveform trace error on '{path}': {source}")]
    Trace {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FxsimError {
    /// Create an unsupported audio error
    pub fn unsupported_audio(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedAudio {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid program error
    pub fn invalid_program(offset: usize, message: impl Into<String>) -> Self {
        Self::InvalidProgram {
            offset,
            message: message.into(),
        }
    }
}
