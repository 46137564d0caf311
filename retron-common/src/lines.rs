// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Bit layout of the 16-bit FPGA port register.
//!
//! The low byte is always the parallel data bus.  The upper byte carries the
//! FPGA configuration and handshake lines.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Lines: u16 {
        /// 8-bit parallel data bus
        const DATA = 0x00FF;

        /// Busy output from the CPU, strobed to hand a byte to the FPGA
        const DOUT_BUSY = 0x0100;

        /// FPGA INIT_B.  Low during reset, low on CRC error, and used as the
        /// ready line once configured.
        const INIT_B = 0x0200;

        /// Configuration chip select, active low
        const CSI_B = 0x0400;

        /// FPGA PROGRAM_B, active low
        const PROG_B = 0x0800;

        /// FPGA DONE
        const DONE = 0x1000;

        /// Configuration clock
        const CCLK = 0x2000;

        /// Configuration read/write select, low to write
        const RDWR_B = 0x8000;
    }
}

/// Pins whose direction is programmed when entering configuration.
pub const CONFIG_DIRECTION_MASK: u16 = 0xFAFF;

/// Pins driven as outputs while configuring.
pub const CONFIG_OUTPUTS: Lines = Lines::DATA
    .union(Lines::RDWR_B)
    .union(Lines::CCLK)
    .union(Lines::PROG_B)
    .union(Lines::CSI_B);

/// Pins driven high before resetting the FPGA.
pub const CONFIG_IDLE_MASK: u16 = 0xE8FF;

/// Pins driven high once configuration has finished.
pub const OPERATING_MASK: u16 = 0xFAFF;

/// Reverses the bit order of a byte.  The FPGA's configuration shift
/// register takes bitstream bytes MSB-last relative to file order.
pub fn reverse_bits(val: u8) -> u8 {
    let val = (val << 4) | (val >> 4);
    let val = ((val & 0x33) << 2) | ((val & 0xCC) >> 2);
    ((val & 0x55) << 1) | ((val & 0xAA) >> 1)
}
