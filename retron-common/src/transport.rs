// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Byte transfers between the CPU and the FPGA.
//!
//! Two unrelated mechanisms share the data bus:
//! - clocked writes, used only while loading the bitstream.  The CPU is the
//!   clock master and nothing is acknowledged.
//! - handshaked transfers, used once the FPGA is running.  Dropping the busy
//!   line hands a byte over, or asks for one, and INIT_B acts as the ready
//!   line for reads.

use crate::error::{Error, Result};
use crate::gpio::GpioDriver;
use crate::lines::{Lines, reverse_bits};
use crate::session::Session;

impl<D: GpioDriver> Session<D> {
    /// Clocks one bitstream byte into the FPGA configuration port.
    pub fn clocked_write(&mut self, val: u8) -> Result<()> {
        self.set_lines(Lines::CCLK, false)?;
        self.set_bits(Lines::DATA.bits(), reverse_bits(val) as u16)?;
        self.set_lines(Lines::CCLK, true)
    }

    pub fn clear_busy(&mut self) -> Result<()> {
        self.set_lines(Lines::DOUT_BUSY, false)
    }

    pub fn set_busy(&mut self) -> Result<()> {
        self.set_lines(Lines::DOUT_BUSY, true)
    }

    pub fn write_byte(&mut self, val: u8) -> Result<()> {
        self.ensure_write()?;
        self.set_bits(Lines::DATA.bits(), val as u16)?;
        self.clear_busy()?;
        self.delay();
        self.set_busy()?;
        self.delay();
        Ok(())
    }

    pub fn write_u32le(&mut self, val: u32) -> Result<()> {
        for byte in val.to_le_bytes() {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let polls = self.timing().read_polls;
        self.ensure_read()?;
        self.clear_busy()?;
        self.delay();
        if !self.wait_low(Lines::INIT_B, polls)? {
            return Err(Error::Timeout {
                what: "data (low)",
                polls,
            });
        }
        let val = self.get_bits(Lines::DATA.bits())? as u8;
        self.set_busy()?;
        if !self.wait_high(Lines::INIT_B, polls)? {
            return Err(Error::Timeout {
                what: "data (high)",
                polls,
            });
        }
        Ok(val)
    }

    pub fn read_u16le(&mut self) -> Result<u16> {
        let lsb = self.read_byte()?;
        let msb = self.read_byte()?;
        Ok(u16::from_le_bytes([lsb, msb]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusDirection;
    use crate::config::Timing;
    use crate::error::ErrorKind;
    use crate::sim::{SimFpga, fast_timing};

    #[test]
    fn test_clocked_write_reverses_bits() {
        let mut sim = SimFpga::new();
        let mut session = Session::open(&mut sim, Timing::default()).unwrap();
        session.set_lines(Lines::CSI_B | Lines::RDWR_B, false).unwrap();
        for byte in [0x01, 0xAA, 0x12] {
            session.clocked_write(byte).unwrap();
        }
        // No handshake and no direction changes
        assert_eq!(session.direction(), None);
        drop(session);
        assert_eq!(sim.clocked, vec![0x80, 0x55, 0x48]);
        assert!(sim.direction_calls.is_empty());
    }

    #[test]
    fn test_write_byte_handshake() {
        let mut sim = SimFpga::configured(Vec::new());
        let mut session = Session::open(&mut sim, fast_timing()).unwrap();
        session.write_byte(0x27).unwrap();
        session.write_u32le(0x1234_5678).unwrap();
        assert_eq!(session.direction(), Some(BusDirection::Write));
        drop(session);
        assert_eq!(sim.received, vec![0x27, 0x78, 0x56, 0x34, 0x12]);
        // Busy is left high after each byte
        assert_ne!(sim.outputs() & Lines::DOUT_BUSY.bits(), 0);
        assert_eq!(sim.direction_calls.len(), 1);
    }

    #[test]
    fn test_read_bytes() {
        let mut sim = SimFpga::configured(Vec::new());
        sim.queue_response(&[0x34, 0x12, 0xAB]);
        let mut session = Session::open(&mut sim, fast_timing()).unwrap();
        assert_eq!(session.read_u16le().unwrap(), 0x1234);
        assert_eq!(session.read_byte().unwrap(), 0xAB);
        assert_eq!(session.direction(), Some(BusDirection::Read));
    }

    #[test]
    fn test_read_timeout_is_bounded() {
        let mut sim = SimFpga::configured(Vec::new());
        let mut session = Session::open(&mut sim, fast_timing()).unwrap();
        let err = session.read_byte().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(matches!(
            err,
            Error::Timeout {
                what: "data (low)",
                polls: 1000
            }
        ));
        drop(session);
        assert_eq!(sim.get_calls, 1000);
        assert_eq!(sim.unlock_calls, 1);
    }

    #[test]
    fn test_alternating_transfers_switch_direction_once_each() {
        let mut sim = SimFpga::configured(Vec::new());
        sim.status = 0x0102;
        let mut session = Session::open(&mut sim, fast_timing()).unwrap();
        session.write_byte(0x04).unwrap();
        session.write_byte(0x0E).unwrap();
        session.read_u16le().unwrap();
        session.write_byte(0x04).unwrap();
        session.write_byte(0x0E).unwrap();
        session.read_u16le().unwrap();
        drop(session);
        assert_eq!(
            sim.direction_calls,
            vec![(0xFF, 0xFF), (0xFF, 0x00), (0xFF, 0xFF), (0xFF, 0x00)]
        );
    }
}
