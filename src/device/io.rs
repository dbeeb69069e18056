//! Testbench side of the device pins.
//!
//! [`SimIo::update`] runs before every evaluation. On the low clock phase it
//! advances the SPI master by one half `sck` period (mode 0, MSB first), so
//! the device sees stable `mosi` at every `sck` rising edge it samples on the
//! next system clock rising edge. On every phase it drives `sample_in` and
//! turns a rising `frame` strobe into the latched `ready` flag.

use super::{Delivery, Signals};

/// SPI master shift state.
#[derive(Debug, Clone, Copy, Default)]
struct SpiMaster {
    byte: u8,
    bits_left: u8,
    selected: bool,
    sck: bool,
}

impl SpiMaster {
    fn is_busy(&self) -> bool {
        self.bits_left > 0
    }

    fn load(&mut self, byte: u8) {
        self.byte = byte;
        self.bits_left = 8;
        self.selected = false;
        self.sck = false;
    }

    fn drive(&mut self, pins: &mut Signals) {
        if !self.is_busy() {
            pins.cs = true;
            pins.sck = false;
            return;
        }

        if !self.selected {
            self.selected = true;
            pins.cs = false;
            pins.sck = false;
            pins.mosi = self.byte & 0x80 != 0;
            return;
        }

        if !self.sck {
            // Device samples mosi on this edge
            self.sck = true;
            pins.sck = true;
            return;
        }

        self.sck = false;
        pins.sck = false;
        self.byte <<= 1;
        self.bits_left -= 1;

        if self.bits_left == 0 {
            self.selected = false;
            pins.cs = true;
        } else {
            pins.mosi = self.byte & 0x80 != 0;
        }
    }
}

/// Testbench IO state shared between the driver and the pins.
#[derive(Debug, Clone, Default)]
pub struct SimIo {
    /// Sample presented to the device
    pub sample_in: i16,
    /// Sample captured at the last frame strobe
    pub sample_out: i16,
    /// Set on each frame strobe, cleared by the driver
    pub ready: bool,
    last_frame: bool,
    spi: SpiMaster,
    bytes_sent: u64,
}

impl SimIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a byte is still being shifted out.
    pub fn spi_busy(&self) -> bool {
        self.spi.is_busy()
    }

    /// Bytes fully handed to the shift register so far.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Offer a byte to the link. Rejected while shifting or while the device is busy.
    pub fn send(&mut self, byte: u8, device_busy: bool) -> Delivery {
        if self.spi.is_busy() || device_busy {
            return Delivery::Rejected;
        }
        self.spi.load(byte);
        self.bytes_sent += 1;
        Delivery::Accepted
    }

    /// Apply pending updates to the pins.
    pub fn update(&mut self, pins: &mut Signals) {
        if !pins.sys_clk {
            self.spi.drive(pins);
        }

        if pins.frame && !self.last_frame {
            self.ready = true;
            self.sample_out = pins.sample_out;
        }
        self.last_frame = pins.frame;

        pins.sample_in = self.sample_in;
    }
}
