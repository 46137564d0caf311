// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! A simulated Retron 5 FPGA port, for driving the protocol layers in
//! tests.
//!
//! Models just enough of the hardware to be useful:
//! - PROG_B/INIT_B reset behaviour
//! - bitstream capture on CCLK rising edges, DONE and CRC signalling
//! - the busy/ready handshake once configured
//! - the command language, backed by 16-bit cartridge memory which returns
//!   each word high byte first
//!
//! Every call is counted so tests can check bus discipline, and failures
//! can be injected at various points.

use std::collections::VecDeque;
use std::io;

use crate::config::Timing;
use crate::fpga::IDENT_LEN;
use crate::gpio::{GpioDriver, Port};
use crate::lines::Lines;

/// Default timing with the handshake delay removed.
pub fn fast_timing() -> Timing {
    Timing {
        handshake_delay_us: 0,
        ..Timing::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Console,
    Flash,
    Leds,
}

#[derive(Debug)]
pub struct SimFpga {
    // Levels last driven by the host
    outputs: u16,
    data_is_output: bool,

    // Levels driven by the FPGA
    init: bool,
    done: bool,
    data_in: u8,

    configured: bool,
    presenting: bool,
    responses: VecDeque<u8>,
    pending: Vec<u8>,
    target: Target,
    address: u32,
    length_minus_one: u32,

    /// Number of clocked bytes after which DONE rises.  `None` never
    /// finishes configuration.
    pub done_after: Option<usize>,
    /// Signal a CRC error instead of DONE
    pub crc_error: bool,
    /// INIT_B does not follow PROG_B low
    pub ignore_reset: bool,
    /// INIT_B does not recover when PROG_B is released
    pub init_stuck_low: bool,

    pub cart_powered: bool,
    pub status: u16,
    pub ident: [u8; IDENT_LEN],
    /// Identify responses used in preference to `ident`, in order
    pub ident_overrides: VecDeque<[u8; IDENT_LEN]>,
    pub rom: Vec<u8>,
    pub leds: Option<u8>,

    /// After this many range reads have started, every get fails
    pub fail_after_range_reads: Option<usize>,
    /// After this many range reads have started, reads are never acked
    pub stall_after_range_reads: Option<usize>,
    pub fail_get_after: Option<usize>,
    pub fail_direction: bool,
    pub fail_lock: bool,
    pub fail_unlock: bool,

    /// Bitstream bytes as seen on the data bus
    pub clocked: Vec<u8>,
    pub clocks_after_done: u32,
    /// Every byte received through handshaked writes
    pub received: Vec<u8>,
    /// (word address, length minus one) of each range read
    pub range_reads: Vec<(u32, u32)>,
    /// (address, value) of each range write to the cartridge or flash
    pub writes: Vec<(u32, u8)>,
    /// (mask, outputs) of each direction call
    pub direction_calls: Vec<(u16, u16)>,
    pub get_calls: usize,
    pub lock_calls: u32,
    pub unlock_calls: u32,
}

impl SimFpga {
    /// An unconfigured FPGA with INIT_B idling high.
    pub fn new() -> Self {
        Self {
            outputs: 0,
            data_is_output: false,
            init: true,
            done: false,
            data_in: 0,
            configured: false,
            presenting: false,
            responses: VecDeque::new(),
            pending: Vec::new(),
            target: Target::Console,
            address: 0,
            length_minus_one: 0,
            done_after: None,
            crc_error: false,
            ignore_reset: false,
            init_stuck_low: false,
            cart_powered: false,
            status: 0x0001,
            ident: [0x52, 0x35, 0x46, 0x50, 0x47, 0x41, 0x01],
            ident_overrides: VecDeque::new(),
            rom: Vec::new(),
            leds: None,
            fail_after_range_reads: None,
            stall_after_range_reads: None,
            fail_get_after: None,
            fail_direction: false,
            fail_lock: false,
            fail_unlock: false,
            clocked: Vec::new(),
            clocks_after_done: 0,
            received: Vec::new(),
            range_reads: Vec::new(),
            writes: Vec::new(),
            direction_calls: Vec::new(),
            get_calls: 0,
            lock_calls: 0,
            unlock_calls: 0,
        }
    }

    /// An FPGA that has already been configured, with `rom` in the
    /// cartridge slot.
    pub fn configured(rom: Vec<u8>) -> Self {
        let mut sim = Self::new();
        sim.configured = true;
        sim.done = true;
        sim.rom = rom;
        sim
    }

    pub fn outputs(&self) -> u16 {
        self.outputs
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn queue_response(&mut self, bytes: &[u8]) {
        self.responses.extend(bytes.iter().copied());
    }

    fn rising(old: u16, new: u16, line: Lines) -> bool {
        old & line.bits() == 0 && new & line.bits() != 0
    }

    fn on_prog(&mut self, high: bool) {
        if high {
            if !self.init_stuck_low {
                self.init = true;
            }
        } else {
            self.configured = false;
            self.done = false;
            self.clocked.clear();
            self.clocks_after_done = 0;
            if !self.ignore_reset {
                self.init = false;
            }
        }
    }

    fn on_cclk_rising(&mut self, outputs: u16) {
        let selected = outputs & (Lines::CSI_B | Lines::RDWR_B).bits() == 0;
        if self.done {
            self.clocks_after_done += 1;
            return;
        }
        if !selected {
            return;
        }
        self.clocked.push(outputs as u8);
        if let Some(needed) = self.done_after {
            if self.clocked.len() >= needed {
                if self.crc_error {
                    self.init = false;
                } else {
                    self.done = true;
                    self.configured = true;
                }
            }
        }
    }

    fn on_busy(&mut self, high: bool) {
        if !self.configured {
            return;
        }
        if high {
            if self.presenting {
                self.presenting = false;
                self.init = true;
            }
        } else if self.data_is_output {
            self.receive(self.outputs as u8);
        } else if let Some(byte) = self.responses.pop_front() {
            self.data_in = byte;
            self.presenting = true;
            self.init = false;
        }
    }

    fn receive(&mut self, byte: u8) {
        self.received.push(byte);
        self.pending.push(byte);
        let needed = match self.pending[0] {
            0x08 | 0x0B | 0x0C => 5,
            0x1F => 2,
            _ => 1,
        };
        if self.pending.len() < needed {
            return;
        }
        let command: Vec<u8> = std::mem::take(&mut self.pending);
        let operand = |c: &[u8]| u32::from_le_bytes([c[1], c[2], c[3], c[4]]);
        match command[0] {
            0x01 => self.target = Target::Console,
            0x24 => self.target = Target::Flash,
            0x25 => self.target = Target::Leds,
            0x08 => self.address = operand(&command),
            0x0C => self.length_minus_one = operand(&command),
            0x0E => {
                let status = self.status.to_le_bytes();
                self.queue_response(&status);
            }
            0x0F => {
                let ident = self.ident_overrides.pop_front().unwrap_or(self.ident);
                self.queue_response(&ident);
            }
            0x10 => self.start_range_read(),
            0x1F => match self.target {
                Target::Leds => self.leds = Some(command[1]),
                _ => self.writes.push((self.address, command[1])),
            },
            0x26 => self.cart_powered = false,
            0x27 => self.cart_powered = true,
            _ => {}
        }
    }

    fn start_range_read(&mut self) {
        let started = self.range_reads.len();
        self.range_reads
            .push((self.address, self.length_minus_one));
        if self.stall_after_range_reads.is_some_and(|n| started >= n) {
            return;
        }
        let base = self.address as usize * 2;
        for i in 0..=self.length_minus_one as usize {
            let byte = self.rom.get((base + i) ^ 1).copied().unwrap_or(0xFF);
            self.responses.push_back(byte);
        }
    }

    fn check_get_failure(&self) -> io::Result<()> {
        if self.fail_get_after.is_some_and(|n| self.get_calls > n) {
            return Err(io::Error::other("injected get failure"));
        }
        if self
            .fail_after_range_reads
            .is_some_and(|n| self.range_reads.len() > n)
        {
            return Err(io::Error::other("injected get failure"));
        }
        Ok(())
    }
}

impl GpioDriver for SimFpga {
    fn set_bits(&mut self, _port: Port, mask: u16, value: u16) -> io::Result<()> {
        let old = self.outputs;
        let new = (old & !mask) | (value & mask);
        self.outputs = new;

        if mask & Lines::PROG_B.bits() != 0 {
            self.on_prog(new & Lines::PROG_B.bits() != 0);
        }
        if Self::rising(old, new, Lines::CCLK) {
            self.on_cclk_rising(new);
        }
        if mask & Lines::DOUT_BUSY.bits() != 0 {
            self.on_busy(new & Lines::DOUT_BUSY.bits() != 0);
        }
        Ok(())
    }

    fn get_bits(&mut self, _port: Port, mask: u16) -> io::Result<u16> {
        self.get_calls += 1;
        self.check_get_failure()?;

        let inputs = (Lines::INIT_B | Lines::DONE).bits();
        let mut value = self.outputs & !inputs;
        if self.init {
            value |= Lines::INIT_B.bits();
        }
        if self.done {
            value |= Lines::DONE.bits();
        }
        if !self.data_is_output {
            value = (value & !Lines::DATA.bits()) | self.data_in as u16;
        }
        Ok(value & mask)
    }

    fn set_direction(&mut self, _port: Port, mask: u16, outputs: u16) -> io::Result<()> {
        self.direction_calls.push((mask, outputs));
        if self.fail_direction {
            return Err(io::Error::other("injected direction failure"));
        }
        let data = Lines::DATA.bits();
        if mask & data == data {
            self.data_is_output = outputs & data != 0;
        }
        Ok(())
    }

    fn lock(&mut self, _port: Port) -> io::Result<()> {
        self.lock_calls += 1;
        if self.fail_lock {
            return Err(io::Error::other("injected lock failure"));
        }
        Ok(())
    }

    fn unlock(&mut self, _port: Port) -> io::Result<()> {
        self.unlock_calls += 1;
        if self.fail_unlock {
            return Err(io::Error::other("injected unlock failure"));
        }
        Ok(())
    }
}
