// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! The command language understood by the configured FPGA.
//!
//! Every command is a single opcode byte sent with a handshaked write,
//! optionally followed by an operand.  Multi-byte operands are little
//! endian.

use log::{debug, trace};

use crate::error::Result;
use crate::gpio::GpioDriver;
use crate::session::Session;

/// Bus mode operand selecting the Mega Drive cartridge bus
pub const MODE_MEGA_DRIVE: u32 = 2;

/// Flash command sequence sent by [`write_magic`]: (address, value)
const MAGIC_SEQUENCE: [(u32, u8); 3] = [(0x5555, 0xAA), (0x2AAA, 0x55), (0x5555, 0xB0)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
pub enum Command {
    /// Routes following commands to the cartridge slot
    SelectConsole,

    /// Status query prefix
    StatusPrefix,

    /// Sets the range start address (4-byte operand)
    SetAddress,

    /// Sets the bus mode (4-byte operand)
    SetMode,

    /// Sets the range length minus one (4-byte operand)
    SetLength,

    /// Returns the 2-byte cartridge status
    Status,

    /// Returns the FPGA identify bytes
    Identify,

    /// Reads the configured range, one handshake read per byte
    ReadRange,

    /// Writes the following data byte at the configured address
    WriteRange,

    /// Routes following commands to the flash unlock logic
    SelectFlash,

    /// Routes following commands to the LED register
    SelectLeds,

    CartPowerOff,

    CartPowerOn,
}

impl Command {
    pub fn opcode(&self) -> u8 {
        match self {
            Command::SelectConsole => 0x01,
            Command::StatusPrefix => 0x04,
            Command::SetAddress => 0x08,
            Command::SetMode => 0x0B,
            Command::SetLength => 0x0C,
            Command::Status => 0x0E,
            Command::Identify => 0x0F,
            Command::ReadRange => 0x10,
            Command::WriteRange => 0x1F,
            Command::SelectFlash => 0x24,
            Command::SelectLeds => 0x25,
            Command::CartPowerOff => 0x26,
            Command::CartPowerOn => 0x27,
        }
    }
}

impl<D: GpioDriver> Session<D> {
    pub fn send(&mut self, command: Command) -> Result<()> {
        trace!("Sending {} ({:#04X})", command, command.opcode());
        self.write_byte(command.opcode())
    }

    fn send_u32(&mut self, command: Command, operand: u32) -> Result<()> {
        self.send(command)?;
        self.write_u32le(operand)
    }

    pub fn set_address(&mut self, address: u32) -> Result<()> {
        self.send_u32(Command::SetAddress, address)
    }

    /// Sets the range length.  `len` must be at least 1.
    pub fn set_length(&mut self, len: u32) -> Result<()> {
        debug_assert!(len > 0);
        self.send_u32(Command::SetLength, len - 1)
    }

    pub fn cart_on(&mut self) -> Result<()> {
        self.send(Command::CartPowerOn)
    }

    pub fn cart_off(&mut self) -> Result<()> {
        self.send(Command::CartPowerOff)
    }

    pub fn cart_status(&mut self) -> Result<u16> {
        self.send(Command::StatusPrefix)?;
        self.send(Command::Status)?;
        self.read_u16le()
    }

    /// Puts the cartridge slot into Mega Drive mode.
    pub fn setup_console(&mut self) -> Result<()> {
        self.send(Command::SelectConsole)?;
        self.send_u32(Command::SetMode, MODE_MEGA_DRIVE)
    }

    /// Sends the flash unlock sequence, finishing with a write of 1 to
    /// address 0 if `flag` is set, 0 otherwise.
    pub fn write_magic(&mut self, flag: bool) -> Result<()> {
        self.send(Command::SelectFlash)?;
        self.send_u32(Command::SetMode, MODE_MEGA_DRIVE)?;
        for (address, value) in MAGIC_SEQUENCE {
            self.write_at(address, value)?;
        }
        self.write_at(0, flag as u8)
    }

    fn write_at(&mut self, address: u32, value: u8) -> Result<()> {
        self.set_address(address)?;
        self.send(Command::WriteRange)?;
        self.write_byte(value)
    }

    pub fn set_leds(&mut self, value: u8) -> Result<()> {
        self.send(Command::SelectLeds)?;
        self.send(Command::WriteRange)?;
        self.write_byte(value)?;
        self.ensure_read()
    }

    fn start_range_read(&mut self, address: u32, len: u32) -> Result<()> {
        debug!("Range read: address {:#x}, length {:#x}", address, len);
        self.set_address(address)?;
        self.set_length(len)?;
        self.send(Command::ReadRange)
    }

    /// Reads `dst.len()` bytes starting at `start`, in the order the FPGA
    /// returns them.
    pub fn read_range(&mut self, dst: &mut [u8], start: u32) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        self.start_range_read(start, dst.len() as u32)?;
        for byte in dst.iter_mut() {
            *byte = self.read_byte()?;
        }
        Ok(())
    }

    /// Reads from 16-bit wide cartridge memory, where each word arrives
    /// high byte first.  `start` is a byte address and must be even.
    ///
    /// The bus transfers whole words, so an odd-length `dst` is read as the
    /// next even length and the final high byte is discarded.
    pub fn read_range_swapped(&mut self, dst: &mut [u8], start: u32) -> Result<()> {
        debug_assert!(start % 2 == 0);
        if dst.is_empty() {
            return Ok(());
        }
        let even = (dst.len() + 1) & !1;
        self.start_range_read(start / 2, even as u32)?;

        let (words, tail) = dst.split_at_mut(dst.len() & !1);
        for pair in words.chunks_exact_mut(2) {
            pair[1] = self.read_byte()?;
            pair[0] = self.read_byte()?;
        }
        if let [last] = tail {
            let _high = self.read_byte()?;
            *last = self.read_byte()?;
        }
        Ok(())
    }
}
