//! Device model boundary.
//!
//! The co-simulation talks to the hardware through two layers:
//!
//! - a [`DeviceModel`] exposing the pin snapshot and an `eval()` step, as a
//!   generated RTL model would, and
//! - the testbench side of those pins ([`SimIo`]): the SPI master that
//!   shifts command bytes in and the latch that turns the device's sample
//!   strobe into a "ready" flag.
//!
//! [`Bench`] glues the two together behind the [`Testbench`] trait, which is
//! all the driver depends on.

mod fpga;
mod io;

pub use fpga::FpgaModel;
pub use io::SimIo;

/// Pin snapshot of the device.
///
/// `cs` is active low. `miso` is used by the device as a busy line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signals {
    pub sys_clk: bool,
    pub rst: bool,
    pub cs: bool,
    pub sck: bool,
    pub mosi: bool,
    pub miso: bool,
    /// Sample strobe, high for one clock when a new sample is exchanged
    pub frame: bool,
    pub sample_in: i16,
    pub sample_out: i16,
}

impl Default for Signals {
    fn default() -> Self {
        Self {
            sys_clk: false,
            rst: false,
            cs: true,
            sck: false,
            mosi: false,
            miso: false,
            frame: false,
            sample_in: 0,
            sample_out: 0,
        }
    }
}

/// A clocked device model.
pub trait DeviceModel {
    fn signals(&self) -> &Signals;

    fn signals_mut(&mut self) -> &mut Signals;

    /// Settle the model for the current input pins.
    fn eval(&mut self);
}

/// Outcome of offering one byte to the serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Accepted,
    Rejected,
}

/// Everything the driver needs from the device and its testbench IO.
pub trait Testbench {
    /// Drive the system clock pin.
    fn set_clock(&mut self, high: bool);

    /// Drive the reset pin.
    fn set_reset(&mut self, asserted: bool);

    /// Apply pending testbench input updates to the pins.
    fn update_io(&mut self);

    /// Run one device evaluation.
    fn eval(&mut self);

    /// Current pin snapshot.
    fn signals(&self) -> Signals;

    /// Whether the device has produced a sample since the flag was cleared.
    fn sample_ready(&self) -> bool;

    fn clear_sample_ready(&mut self);

    /// Value presented on the sample input pin from the next update on.
    fn set_sample_in(&mut self, sample: i16);

    /// Last sample captured from the device.
    fn sample_out(&self) -> i16;

    /// Offer one command byte to the serial link.
    fn send_byte(&mut self, byte: u8) -> Delivery;
}

/// A device model driven by the standard testbench IO.
#[derive(Debug)]
pub struct Bench<D: DeviceModel> {
    device: D,
    io: SimIo,
}

impl<D: DeviceModel> Bench<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            io: SimIo::new(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn io(&self) -> &SimIo {
        &self.io
    }
}

impl<D: DeviceModel> Testbench for Bench<D> {
    fn set_clock(&mut self, high: bool) {
        self.device.signals_mut().sys_clk = high;
    }

    fn set_reset(&mut self, asserted: bool) {
        self.device.signals_mut().rst = asserted;
    }

    fn update_io(&mut self) {
        self.io.update(self.device.signals_mut());
    }

    fn eval(&mut self) {
        self.device.eval();
    }

    fn signals(&self) -> Signals {
        *self.device.signals()
    }

    fn sample_ready(&self) -> bool {
        self.io.ready
    }

    fn clear_sample_ready(&mut self) {
        self.io.ready = false;
    }

    fn set_sample_in(&mut self, sample: i16) {
        self.io.sample_in = sample;
    }

    fn sample_out(&self) -> i16 {
        self.io.sample_out
    }

    fn send_byte(&mut self, byte: u8) -> Delivery {
        let busy = self.device.signals().miso;
        self.io.send(byte, busy)
    }
}
