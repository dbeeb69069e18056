//! Behavioral model of the effects FPGA.
//!
//! Everything happens on the rising edge of `sys_clk`:
//!
//! - `rst` high clears all state, including the loaded program.
//! - With `cs` low, each `sck` rising edge shifts `mosi` into the receive
//!   register, MSB first. Complete bytes go to a [`ProgramLoader`]; a closed
//!   program replaces the running effect chain and holds `miso` (busy) high
//!   for `reconfig_ticks` clocks.
//! - Every `clocks_per_sample` clocks the model latches `sample_in`, runs it
//!   through the effect chain into a `pipeline_depth` deep output pipeline,
//!   drives `sample_out`, and pulses `frame` for one clock.

use std::collections::VecDeque;

use log::{debug, warn};

use super::{DeviceModel, Signals};
use crate::config::{DeviceConfig, MIN_CLOCKS_PER_SAMPLE};
use crate::program::{EffectChain, Program, ProgramLoader};

#[derive(Debug)]
pub struct FpgaModel {
    pins: Signals,
    clocks_per_sample: u32,
    pipeline_depth: usize,
    reconfig_ticks: u32,

    prev_clk: bool,
    prev_sck: bool,

    clock_count: u32,
    rx_shift: u8,
    rx_bits: u8,
    busy: u32,

    loader: ProgramLoader,
    chain: EffectChain,
    pipeline: VecDeque<i16>,

    bytes_received: u64,
    program: Option<Program>,
}

impl FpgaModel {
    pub fn new(config: &DeviceConfig) -> Self {
        let mut model = Self {
            pins: Signals::default(),
            clocks_per_sample: config.clocks_per_sample.max(MIN_CLOCKS_PER_SAMPLE),
            pipeline_depth: config.pipeline_depth,
            reconfig_ticks: config.reconfig_ticks,
            prev_clk: false,
            prev_sck: false,
            clock_count: 0,
            rx_shift: 0,
            rx_bits: 0,
            busy: 0,
            loader: ProgramLoader::new(),
            chain: EffectChain::default(),
            pipeline: VecDeque::new(),
            bytes_received: 0,
            program: None,
        };
        model.reset_state();
        model
    }

    /// Command bytes received over SPI since construction.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// The most recently applied program.
    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    fn reset_state(&mut self) {
        self.clock_count = 0;
        self.rx_shift = 0;
        self.rx_bits = 0;
        self.busy = 0;
        self.loader.reset();
        self.chain = EffectChain::default();
        self.program = None;
        self.pipeline.clear();
        self.pipeline.extend(std::iter::repeat(0).take(self.pipeline_depth));
        self.pins.frame = false;
        self.pins.miso = false;
        self.pins.sample_out = 0;
        self.prev_sck = self.pins.sck;
    }

    fn clock_spi(&mut self) {
        let sck = self.pins.sck;
        let rising = sck && !self.prev_sck;
        self.prev_sck = sck;

        if self.pins.cs {
            self.rx_bits = 0;
            return;
        }
        if !rising {
            return;
        }

        self.rx_shift = (self.rx_shift << 1) | self.pins.mosi as u8;
        self.rx_bits += 1;
        if self.rx_bits == 8 {
            self.rx_bits = 0;
            let byte = self.rx_shift;
            self.receive(byte);
        }
    }

    fn receive(&mut self, byte: u8) {
        self.bytes_received += 1;
        match self.loader.feed(byte) {
            Some(Ok(program)) => {
                debug!("device applied program with {} stages", program.stages.len());
                self.chain = EffectChain::new(&program);
                self.program = Some(program);
                self.busy = self.reconfig_ticks;
            }
            Some(Err(e)) => warn!("device dropped program: {}", e),
            None => {}
        }
    }

    fn clock_audio(&mut self) {
        self.pins.frame = false;
        self.clock_count += 1;
        if self.clock_count < self.clocks_per_sample {
            return;
        }
        self.clock_count = 0;

        let processed = self.chain.process(self.pins.sample_in);
        self.pipeline.push_back(processed);
        self.pins.sample_out = self.pipeline.pop_front().unwrap_or(0);
        self.pins.frame = true;
    }
}

impl DeviceModel for FpgaModel {
    fn signals(&self) -> &Signals {
        &self.pins
    }

    fn signals_mut(&mut self) -> &mut Signals {
        &mut self.pins
    }

    fn eval(&mut self) {
        let rising = self.pins.sys_clk && !self.prev_clk;
        self.prev_clk = self.pins.sys_clk;
        if !rising {
            return;
        }

        if self.pins.rst {
            self.reset_state();
            return;
        }

        self.busy = self.busy.saturating_sub(1);
        self.clock_spi();
        self.pins.miso = self.busy > 0;
        self.clock_audio();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Bench, Delivery, Testbench};
    use crate::program::Stage;

    fn config(clocks_per_sample: u32, pipeline_depth: usize, reconfig_ticks: u32) -> DeviceConfig {
        DeviceConfig {
            clocks_per_sample,
            pipeline_depth,
            reconfig_ticks,
        }
    }

    fn tick<B: Testbench>(bench: &mut B) {
        for level in [true, false] {
            bench.set_clock(level);
            bench.update_io();
            bench.eval();
        }
    }

    #[test]
    fn test_frame_period() {
        let mut bench = Bench::new(FpgaModel::new(&config(8, 0, 0)));
        let mut frames = Vec::new();
        for t in 0..40 {
            tick(&mut bench);
            if bench.sample_ready() {
                frames.push(t);
                bench.clear_sample_ready();
            }
        }
        assert_eq!(frames, vec![7, 15, 23, 31, 39]);
    }

    #[test]
    fn test_single_clock_sample_period_is_raised() {
        let mut bench = Bench::new(FpgaModel::new(&config(1, 0, 0)));
        let mut frames = Vec::new();
        for t in 0..8 {
            tick(&mut bench);
            if bench.sample_ready() {
                frames.push(t);
                bench.clear_sample_ready();
            }
        }
        // frame must fall between strobes for every one to register
        assert_eq!(frames, vec![1, 3, 5, 7]);
    }

    #[test]
    fn test_pipeline_latency() {
        let mut bench = Bench::new(FpgaModel::new(&config(4, 2, 0)));
        let mut outputs = Vec::new();
        let mut n = 0i16;
        while outputs.len() < 6 {
            tick(&mut bench);
            if bench.sample_ready() {
                outputs.push(bench.sample_out());
                n += 1;
                bench.set_sample_in(n * 100);
                bench.clear_sample_ready();
            }
        }
        // x0 = 0 is latched on frame 1, x1 = 100 on frame 2; two stages of pipeline
        assert_eq!(outputs, vec![0, 0, 0, 100, 200, 300]);
    }

    #[test]
    fn test_program_over_spi() {
        let program = Program::new(vec![Stage::Gain { level: 512 }]);
        let batch = program.encode();
        let mut bench = Bench::new(FpgaModel::new(&config(64, 0, 0)));

        let mut next = 0;
        for _ in 0..1000 {
            if let Some(byte) = batch.get(next) {
                if bench.send_byte(byte) == Delivery::Accepted {
                    next += 1;
                }
            }
            tick(&mut bench);
        }

        assert_eq!(next, batch.len());
        assert_eq!(bench.device().bytes_received(), batch.len() as u64);
        assert_eq!(bench.device().program(), Some(&program));
    }

    #[test]
    fn test_busy_after_reconfig_and_reset() {
        let batch = Program::default().encode();
        let mut bench = Bench::new(FpgaModel::new(&config(64, 0, 5)));

        let mut busy_clocks = 0;
        for &byte in batch.as_bytes() {
            assert_eq!(bench.send_byte(byte), Delivery::Accepted);
            for _ in 0..40 {
                tick(&mut bench);
                if bench.signals().miso {
                    busy_clocks += 1;
                }
            }
        }
        assert_eq!(busy_clocks, 5);
        assert!(bench.device().program().is_some());
        assert!(!bench.signals().miso);

        bench.set_reset(true);
        tick(&mut bench);
        bench.set_reset(false);
        assert!(bench.device().program().is_none());
    }

    #[test]
    fn test_busy_rejects_bytes() {
        let batch = Program::default().encode();
        let mut bench = Bench::new(FpgaModel::new(&config(64, 0, 100)));

        for &byte in batch.as_bytes() {
            assert_eq!(bench.send_byte(byte), Delivery::Accepted);
            for _ in 0..20 {
                tick(&mut bench);
            }
        }
        assert!(bench.signals().miso);
        assert_eq!(bench.send_byte(0x00), Delivery::Rejected);
    }
}
