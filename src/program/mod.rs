//! Effect programs and the command bytes that carry them to the device.
//!
//! A [`Program`] is an ordered list of processing stages. On the wire it is
//! framed as a [`Batch`]:
//!
//! ```text
//! batch   = BEGIN { stage } END
//! stage   = GAIN level_hi level_lo
//!         | DELAY samples_hi samples_lo mix feedback
//!
//! BEGIN   = 0x80        END   = 0x81
//! GAIN    = 0x10        level: signed Q8.8, big endian
//! DELAY   = 0x11        samples: u16 big endian, mix/feedback: Q0.8
//! ```
//!
//! Both the device model and the reference emulator decode batches with
//! the same [`Program::decode`], so a program applied to one is applied to
//! the other bit for bit.

mod chain;
mod compiler;

pub use chain::EffectChain;
pub use compiler::{compile, compile_file, load_effect, parse_effect, EffectDesc, StageDesc};

use std::fmt;

use crate::error::{FxsimError, Result};

/// Opens a program.
pub const CMD_BEGIN_PROGRAM: u8 = 0x80;
/// Closes a program; the device applies it on receipt.
pub const CMD_END_PROGRAM: u8 = 0x81;
/// Gain stage opcode.
pub const OP_GAIN: u8 = 0x10;
/// Delay stage opcode.
pub const OP_DELAY: u8 = 0x11;

/// Number of operand bytes following an opcode, or `None` if unknown.
pub fn operand_len(opcode: u8) -> Option<usize> {
    match opcode {
        OP_GAIN => Some(2),
        OP_DELAY => Some(4),
        _ => None,
    }
}

/// An immutable sequence of command bytes configuring the device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch(Box<[u8]>);

impl Batch {
    /// Create a batch from raw command bytes.
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// Number of command bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Byte at `index`, if any.
    pub fn get(&self, index: usize) -> Option<u8> {
        self.0.get(index).copied()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Batch {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "] ({} bytes)", self.0.len())
    }
}

/// A single processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Multiply by a signed Q8.8 level (256 = unity)
    Gain { level: i16 },
    /// Delay line with Q0.8 wet mix and feedback
    Delay { samples: u16, mix: u8, feedback: u8 },
}

/// A decoded effect program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    pub stages: Vec<Stage>,
}

impl Program {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Encode into a framed command batch.
    pub fn encode(&self) -> Batch {
        let mut bytes = vec![CMD_BEGIN_PROGRAM];
        for stage in &self.stages {
            match *stage {
                Stage::Gain { level } => {
                    bytes.push(OP_GAIN);
                    bytes.extend_from_slice(&level.to_be_bytes());
                }
                Stage::Delay {
                    samples,
                    mix,
                    feedback,
                } => {
                    bytes.push(OP_DELAY);
                    bytes.extend_from_slice(&samples.to_be_bytes());
                    bytes.push(mix);
                    bytes.push(feedback);
                }
            }
        }
        bytes.push(CMD_END_PROGRAM);
        Batch::from(bytes)
    }

    /// Decode a complete framed batch.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.first() != Some(&CMD_BEGIN_PROGRAM) {
            return Err(FxsimError::invalid_program(0, "missing BEGIN_PROGRAM"));
        }

        let mut stages = Vec::new();
        let mut pos = 1;
        loop {
            let Some(&opcode) = bytes.get(pos) else {
                return Err(FxsimError::invalid_program(pos, "missing END_PROGRAM"));
            };
            if opcode == CMD_END_PROGRAM {
                if pos + 1 != bytes.len() {
                    return Err(FxsimError::invalid_program(pos + 1, "trailing bytes after END_PROGRAM"));
                }
                return Ok(Self { stages });
            }

            let len = operand_len(opcode).ok_or_else(|| {
                FxsimError::invalid_program(pos, format!("unknown opcode {:#04x}", opcode))
            })?;
            let operands = bytes
                .get(pos + 1..pos + 1 + len)
                .ok_or_else(|| FxsimError::invalid_program(pos, "truncated operands"))?;

            stages.push(match opcode {
                OP_GAIN => Stage::Gain {
                    level: i16::from_be_bytes([operands[0], operands[1]]),
                },
                _ => Stage::Delay {
                    samples: u16::from_be_bytes([operands[0], operands[1]]),
                    mix: operands[2],
                    feedback: operands[3],
                },
            });
            pos += 1 + len;
        }
    }
}

/// Byte-at-a-time program decoder, as the device sees the SPI stream.
///
/// Bytes outside a BEGIN/END frame are ignored. Operand bytes are never
/// mistaken for END even when they share its value.
#[derive(Debug, Default)]
pub struct ProgramLoader {
    buffer: Option<Vec<u8>>,
    operands: usize,
}

impl ProgramLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a BEGIN has been seen without its END.
    pub fn is_loading(&self) -> bool {
        self.buffer.is_some()
    }

    /// Drop any partially received program.
    pub fn reset(&mut self) {
        self.buffer = None;
        self.operands = 0;
    }

    /// Feed one received byte. Returns a result once a frame closes.
    pub fn feed(&mut self, byte: u8) -> Option<Result<Program>> {
        let Some(buffer) = self.buffer.as_mut() else {
            if byte == CMD_BEGIN_PROGRAM {
                self.buffer = Some(vec![byte]);
                self.operands = 0;
            }
            return None;
        };

        buffer.push(byte);
        if self.operands > 0 {
            self.operands -= 1;
            return None;
        }

        if byte == CMD_END_PROGRAM {
            let bytes = self.buffer.take()?;
            return Some(Program::decode(&bytes));
        }

        match operand_len(byte) {
            Some(len) => {
                self.operands = len;
                None
            }
            None => {
                let offset = buffer.len() - 1;
                self.reset();
                Some(Err(FxsimError::invalid_program(
                    offset,
                    format!("unknown opcode {:#04x}", byte),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay_program() -> Program {
        Program::new(vec![
            Stage::Delay {
                samples: 0x0081,
                mix: 0x80,
                feedback: 0,
            },
            Stage::Gain { level: -256 },
        ])
    }

    #[test]
    fn test_encode_framing() {
        let batch = delay_program().encode();
        assert_eq!(
            batch.as_bytes(),
            &[0x80, 0x11, 0x00, 0x81, 0x80, 0x00, 0x10, 0xff, 0x00, 0x81]
        );
        assert_eq!(Program::decode(batch.as_bytes()).unwrap(), delay_program());
    }

    #[test]
    fn test_decode_rejects_bad_frames() {
        assert!(Program::decode(&[]).is_err());
        assert!(Program::decode(&[CMD_BEGIN_PROGRAM]).is_err());
        assert!(Program::decode(&[CMD_BEGIN_PROGRAM, 0x42, CMD_END_PROGRAM]).is_err());
        assert!(Program::decode(&[CMD_BEGIN_PROGRAM, OP_GAIN, 0x01, CMD_END_PROGRAM]).is_err());
        assert!(Program::decode(&[CMD_BEGIN_PROGRAM, CMD_END_PROGRAM, 0x00]).is_err());
        assert_eq!(
            Program::decode(&[CMD_BEGIN_PROGRAM, CMD_END_PROGRAM]).unwrap(),
            Program::default()
        );
    }

    #[test]
    fn test_loader_ignores_operand_that_looks_like_end() {
        let batch = delay_program().encode();
        let mut loader = ProgramLoader::new();

        // Noise before the frame is dropped
        assert!(loader.feed(0x55).is_none());
        assert!(!loader.is_loading());

        let mut result = None;
        for (i, byte) in batch.as_bytes().iter().enumerate() {
            let out = loader.feed(*byte);
            if i + 1 < batch.len() {
                assert!(out.is_none(), "frame closed early at byte {}", i);
            } else {
                result = out;
            }
        }

        assert_eq!(result.unwrap().unwrap(), delay_program());
        assert!(!loader.is_loading());
    }

    #[test]
    fn test_loader_aborts_on_unknown_opcode() {
        let mut loader = ProgramLoader::new();
        loader.feed(CMD_BEGIN_PROGRAM);
        assert!(matches!(
            loader.feed(0x42),
            Some(Err(FxsimError::InvalidProgram { offset: 1, .. }))
        ));
        assert!(!loader.is_loading());
    }

    #[test]
    fn test_batch_display() {
        let batch = Batch::from(vec![0x80, 0x81]);
        assert_eq!(batch.to_string(), "[80 81] (2 bytes)");
    }
}
