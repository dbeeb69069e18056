//! VCD waveform capture of the device pins.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use vcd::{IdCode, TimescaleUnit, Value};

use crate::device::Signals;
use crate::error::{FxsimError, Result};

const SCOPE: &str = "top";

struct Wires {
    sys_clk: IdCode,
    rst: IdCode,
    cs: IdCode,
    sck: IdCode,
    mosi: IdCode,
    miso: IdCode,
    frame: IdCode,
    sample_in: IdCode,
    sample_out: IdCode,
}

/// Value-change writer keyed by the driver's global time index.
pub struct Tracer<W: Write> {
    writer: vcd::Writer<W>,
    wires: Wires,
    last: Option<Signals>,
    samples: u64,
}

impl Tracer<BufWriter<File>> {
    /// Create a trace file and write its header.
    pub fn create(path: &Path) -> Result<Self> {
        let trace_err = |e| FxsimError::Trace {
            path: path.display().to_string(),
            source: e,
        };
        let file = File::create(path).map_err(trace_err)?;
        Self::new(BufWriter::new(file)).map_err(trace_err)
    }
}

impl<W: Write> Tracer<W> {
    /// Write the VCD header to `out`.
    pub fn new(out: W) -> io::Result<Self> {
        let mut writer = vcd::Writer::new(out);
        writer.timescale(1, TimescaleUnit::NS)?;
        writer.add_module(SCOPE)?;
        let wires = Wires {
            sys_clk: writer.add_wire(1, "sys_clk")?,
            rst: writer.add_wire(1, "rst")?,
            cs: writer.add_wire(1, "cs")?,
            sck: writer.add_wire(1, "sck")?,
            mosi: writer.add_wire(1, "mosi")?,
            miso: writer.add_wire(1, "miso")?,
            frame: writer.add_wire(1, "frame")?,
            sample_in: writer.add_wire(16, "sample_in")?,
            sample_out: writer.add_wire(16, "sample_out")?,
        };
        writer.upscope()?;
        writer.enddefinitions()?;

        Ok(Self {
            writer,
            wires,
            last: None,
            samples: 0,
        })
    }

    /// Number of time points written.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Flush buffered records and release the sink.
    ///
    /// Returns the number of time points written.
    pub fn close(mut self) -> io::Result<u64> {
        self.writer.flush()?;
        Ok(self.samples)
    }

    /// Record the pins at `time`, emitting only the values that changed.
    pub fn dump(&mut self, time: u64, pins: &Signals) -> io::Result<()> {
        self.writer.timestamp(time)?;

        let last = self.last;
        let w = &self.wires;
        let scalars = [
            (w.sys_clk, pins.sys_clk, last.map(|l| l.sys_clk)),
            (w.rst, pins.rst, last.map(|l| l.rst)),
            (w.cs, pins.cs, last.map(|l| l.cs)),
            (w.sck, pins.sck, last.map(|l| l.sck)),
            (w.mosi, pins.mosi, last.map(|l| l.mosi)),
            (w.miso, pins.miso, last.map(|l| l.miso)),
            (w.frame, pins.frame, last.map(|l| l.frame)),
        ];
        for (id, value, previous) in scalars {
            if previous != Some(value) {
                self.writer.change_scalar(id, Value::from(value))?;
            }
        }

        let vectors = [
            (w.sample_in, pins.sample_in, last.map(|l| l.sample_in)),
            (w.sample_out, pins.sample_out, last.map(|l| l.sample_out)),
        ];
        for (id, value, previous) in vectors {
            if previous != Some(value) {
                self.writer.change_vector(id, bits16(value))?;
            }
        }

        self.last = Some(*pins);
        self.samples += 1;
        Ok(())
    }
}

/// MSB-first bit values of a 16-bit sample.
fn bits16(value: i16) -> Vec<Value> {
    let raw = value as u16;
    (0..16)
        .rev()
        .map(|bit| Value::from(raw & (1 << bit) != 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sink that accepts writes but cannot flush.
    struct StuckSink;

    impl Write for StuckSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "device full"))
        }
    }

    #[test]
    fn test_close_reports_flush_failure() {
        let mut tracer = Tracer::new(StuckSink).unwrap();
        tracer.dump(0, &Signals::default()).unwrap();
        assert!(tracer.close().is_err());

        let mut out = Vec::new();
        let mut tracer = Tracer::new(&mut out).unwrap();
        tracer.dump(0, &Signals::default()).unwrap();
        tracer.dump(1, &Signals::default()).unwrap();
        assert_eq!(tracer.close().unwrap(), 2);
    }

    #[test]
    fn test_bits16() {
        let bits = bits16(-2);
        assert_eq!(bits.len(), 16);
        assert!(bits[..15].iter().all(|v| *v == Value::V1));
        assert_eq!(bits[15], Value::V0);
    }

    #[test]
    fn test_value_changes_only() {
        let mut out = Vec::new();
        {
            let mut tracer = Tracer::new(&mut out).unwrap();
            let mut pins = Signals::default();
            tracer.dump(0, &pins).unwrap();
            pins.sys_clk = true;
            tracer.dump(1, &pins).unwrap();
            tracer.dump(2, &pins).unwrap();
            assert_eq!(tracer.samples(), 3);
        }

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("$enddefinitions"));
        assert!(text.contains("sys_clk"));
        assert_eq!(text.matches("$var wire").count(), 9);

        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let at = |stamp: &str| lines.iter().position(|l| *l == stamp).unwrap();
        let (t0, t1, t2) = (at("#0"), at("#1"), at("#2"));

        // Every wire is dumped initially, then only the clock changes
        assert_eq!(t1 - t0 - 1, 9);
        assert_eq!(t2 - t1 - 1, 1);
        assert_eq!(t2, lines.len() - 1);
    }
}
