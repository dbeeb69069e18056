//! Effect descriptor loading and compilation.
//!
//! Effect descriptors are small TOML files:
//!
//! ```toml
//! name = "delay"
//!
//! [[stages]]
//! kind = "delay"
//! samples = 4410
//! mix = 0.5
//! feedback = 0.3
//!
//! [[stages]]
//! kind = "gain"
//! level = 0.8
//! ```

use std::path::Path;

use serde::Deserialize;

use super::{Batch, Program, Stage};
use crate::error::{FxsimError, Result};

/// Feedback is capped below unity to prevent runaway.
const MAX_FEEDBACK: f64 = 0.95;

/// A parsed effect descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct EffectDesc {
    pub name: String,
    #[serde(default)]
    pub stages: Vec<StageDesc>,
}

/// One stage of an effect descriptor, in floating-point units.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StageDesc {
    Gain {
        level: f64,
    },
    Delay {
        samples: u16,
        #[serde(default = "default_mix")]
        mix: f64,
        #[serde(default)]
        feedback: f64,
    },
}

fn default_mix() -> f64 {
    0.5
}

/// Parse an effect descriptor from TOML text.
pub fn parse_effect(text: &str, path: &Path) -> Result<EffectDesc> {
    toml::from_str(text).map_err(|e| FxsimError::EffectParse {
        path: path.display().to_string(),
        source: e,
    })
}

/// Read and parse an effect descriptor file.
pub fn load_effect(path: &Path) -> Result<EffectDesc> {
    let content = std::fs::read_to_string(path).map_err(|e| FxsimError::EffectRead {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_effect(&content, path)
}

/// Lower a descriptor to a fixed-point program.
pub fn compile(desc: &EffectDesc) -> Program {
    let stages = desc
        .stages
        .iter()
        .map(|stage| match *stage {
            StageDesc::Gain { level } => Stage::Gain {
                level: (level * 256.0).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16,
            },
            StageDesc::Delay {
                samples,
                mix,
                feedback,
            } => Stage::Delay {
                samples,
                mix: to_q08(mix.clamp(0.0, 1.0)),
                feedback: to_q08(feedback.clamp(0.0, MAX_FEEDBACK)),
            },
        })
        .collect();
    Program::new(stages)
}

/// Load, compile and encode an effect descriptor file.
pub fn compile_file(path: &Path) -> Result<Batch> {
    let desc = load_effect(path)?;
    Ok(compile(&desc).encode())
}

fn to_q08(value: f64) -> u8 {
    (value * 256.0).round().clamp(0.0, 255.0) as u8
}
