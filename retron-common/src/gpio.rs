// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Primitive GPIO operations offered by the Retron 5 host driver.
//!
//! Everything above this layer talks to the hardware exclusively through
//! [`GpioDriver`], so the protocol logic can be driven against a simulated
//! peripheral in tests.

use std::io;

/// GPIO port groups exposed by the host driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Port {
    /// FPGA control and data bus
    Fpga,

    /// First joypad port
    Joy0,

    /// Second joypad port
    Joy1,
}

impl Port {
    /// Port number as understood by the host driver
    pub fn id(&self) -> i32 {
        match self {
            Port::Fpga => 0x00,
            Port::Joy0 => 0x01,
            Port::Joy1 => 0x02,
        }
    }
}

/// Masked register access to a single GPIO port, plus the cross-process
/// mutex guarding it.
///
/// Callers must hold the port's lock for every register operation.
pub trait GpioDriver {
    /// Drives the bits in `mask` to the corresponding bits of `value`,
    /// leaving every other bit untouched.
    fn set_bits(&mut self, port: Port, mask: u16, value: u16) -> io::Result<()>;

    /// Samples the bits in `mask`.  Bits outside `mask` read as zero.
    fn get_bits(&mut self, port: Port, mask: u16) -> io::Result<u16>;

    /// Configures the pins in `mask` as outputs where the corresponding bit
    /// of `outputs` is set and as inputs where it is clear.
    fn set_direction(&mut self, port: Port, mask: u16, outputs: u16) -> io::Result<()>;

    fn lock(&mut self, port: Port) -> io::Result<()>;

    fn unlock(&mut self, port: Port) -> io::Result<()>;
}

impl<D: GpioDriver + ?Sized> GpioDriver for &mut D {
    fn set_bits(&mut self, port: Port, mask: u16, value: u16) -> io::Result<()> {
        (**self).set_bits(port, mask, value)
    }

    fn get_bits(&mut self, port: Port, mask: u16) -> io::Result<u16> {
        (**self).get_bits(port, mask)
    }

    fn set_direction(&mut self, port: Port, mask: u16, outputs: u16) -> io::Result<()> {
        (**self).set_direction(port, mask, outputs)
    }

    fn lock(&mut self, port: Port) -> io::Result<()> {
        (**self).lock(port)
    }

    fn unlock(&mut self, port: Port) -> io::Result<()> {
        (**self).unlock(port)
    }
}
