// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! FPGA configuration and post-configuration verification.
//!
//! Configuration is a strictly linear sequence:
//!
//! ```text
//! Idle -> Reset -> Loading -> AwaitDone -> DrainClock -> Complete
//! ```
//!
//! Any failure aborts the sequence.  There is no way back to an earlier
//! state; a fresh session has to start again from `Idle`.

use log::{debug, info, warn};
use std::fs;
use std::path::Path;

use crate::error::{Error, IntegrityWarning, Result};
use crate::gpio::GpioDriver;
use crate::lines::{
    CONFIG_DIRECTION_MASK, CONFIG_IDLE_MASK, CONFIG_OUTPUTS, Lines, OPERATING_MASK,
};
use crate::protocol::Command;
use crate::session::Session;

/// Length of the identify response used for verification
pub const IDENT_LEN: usize = 7;

/// Number of times the identify response is re-read and compared
pub const VERIFY_ROUNDS: usize = 3;

/// An FPGA configuration image, sent to the FPGA byte by byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitstream {
    data: Vec<u8>,
}

impl Bitstream {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|err| Error::Bitstream {
            path: path.to_path_buf(),
            err,
        })?;
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
pub enum ConfigState {
    Idle,
    Reset,
    Loading,
    AwaitDone,
    DrainClock,
    Complete,
}

/// Drives a [`Session`] through the configuration sequence.
pub struct FpgaLoader<'a, D: GpioDriver> {
    session: &'a mut Session<D>,
    state: ConfigState,
}

impl<'a, D: GpioDriver> FpgaLoader<'a, D> {
    pub fn new(session: &'a mut Session<D>) -> Self {
        Self {
            session,
            state: ConfigState::Idle,
        }
    }

    pub fn state(&self) -> ConfigState {
        self.state
    }

    fn enter(&mut self, next: ConfigState) {
        debug_assert!(next > self.state, "{} -> {}", self.state, next);
        debug!("FPGA configuration: {} -> {}", self.state, next);
        self.state = next;
    }

    fn status(&mut self) -> Result<Lines> {
        self.session.read_lines(Lines::INIT_B | Lines::DONE)
    }

    /// Runs the full sequence, leaving the loader in
    /// [`ConfigState::Complete`] on success.
    pub fn configure(&mut self, bitstream: &Bitstream) -> Result<()> {
        self.reset()?;
        self.load(bitstream)?;
        self.await_done()?;
        self.drain_clock()?;
        self.enter(ConfigState::Complete);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let timing = self.session.timing().clone();

        self.session
            .set_direction(CONFIG_DIRECTION_MASK, CONFIG_OUTPUTS.bits())?;
        self.session.set_bits(CONFIG_IDLE_MASK, CONFIG_IDLE_MASK)?;
        let status = self.status()?;
        info!("State before reset: {:X}", status.bits());

        self.session.set_lines(Lines::PROG_B, false)?;
        if !self.session.wait_low(Lines::INIT_B, timing.reset_low_polls)? {
            return Err(Error::FpgaReset {
                level: "low",
                polls: timing.reset_low_polls,
            });
        }
        let status = self.status()?;
        info!("State middle of reset: {:X}", status.bits());

        self.enter(ConfigState::Reset);
        self.session.set_lines(Lines::PROG_B, true)?;
        if !self.session.wait_high(Lines::INIT_B, timing.reset_high_polls)? {
            return Err(Error::FpgaReset {
                level: "high",
                polls: timing.reset_high_polls,
            });
        }
        let status = self.status()?;
        info!("State after reset: {:X}", status.bits());
        Ok(())
    }

    fn load(&mut self, bitstream: &Bitstream) -> Result<()> {
        self.enter(ConfigState::Loading);
        self.session.set_lines(Lines::RDWR_B, false)?;
        self.session.set_lines(Lines::CSI_B, false)?;
        for &byte in bitstream.bytes() {
            self.session.clocked_write(byte)?;
        }
        debug!("Clocked {} bitstream bytes", bitstream.len());
        Ok(())
    }

    fn await_done(&mut self) -> Result<()> {
        self.enter(ConfigState::AwaitDone);
        let polls = self.session.timing().done_polls;
        for _ in 0..polls {
            self.session.set_lines(Lines::CCLK, false)?;
            let status = self.status()?;
            if status.contains(Lines::DONE) {
                info!("State after DONE: {:X}", self.status()?.bits());
                return Ok(());
            }
            if !status.contains(Lines::INIT_B) {
                return Err(Error::Crc);
            }
            self.session.set_lines(Lines::CCLK, true)?;
        }
        Err(Error::DoneTimeout { polls })
    }

    fn drain_clock(&mut self) -> Result<()> {
        self.enter(ConfigState::DrainClock);
        for _ in 0..self.session.timing().startup_clocks {
            self.session.set_lines(Lines::CCLK, false)?;
            self.session.set_lines(Lines::CCLK, true)?;
        }
        info!("State after end config: {:X}", self.status()?.bits());
        self.session.set_lines(Lines::RDWR_B | Lines::CSI_B, true)
    }
}

/// Hands the bus over from configuration to normal operation: busy becomes
/// an output and INIT_B an input, serving as the ready line.
pub fn enter_operating_mode<D: GpioDriver>(session: &mut Session<D>) -> Result<()> {
    session.set_bits(OPERATING_MASK, OPERATING_MASK)?;
    session.set_direction(
        (Lines::DOUT_BUSY | Lines::INIT_B).bits(),
        Lines::DOUT_BUSY.bits(),
    )
}

fn verify_setup<D: GpioDriver>(session: &mut Session<D>) -> Result<()> {
    session.ensure_read()?;
    session.set_lines(Lines::CSI_B, true)?;
    session.set_busy()?;
    session.delay();
    session.set_lines(Lines::CSI_B, false)?;
    session.delay();
    session.set_lines(Lines::CSI_B, true)?;
    session.delay();
    Ok(())
}

fn read_ident<D: GpioDriver>(session: &mut Session<D>) -> Result<[u8; IDENT_LEN]> {
    verify_setup(session)?;
    session.write_byte(Command::Identify.opcode())?;
    session.ensure_read()?;
    let mut ident = [0u8; IDENT_LEN];
    for byte in ident.iter_mut() {
        *byte = session.read_byte()?;
    }
    Ok(ident)
}

/// Reads the configured FPGA's identify response several times and checks
/// it is stable.
///
/// This check has false positives on real hardware, so problems are logged
/// and returned rather than treated as errors.
pub fn verify<D: GpioDriver>(session: &mut Session<D>) -> Result<Vec<IntegrityWarning>> {
    let mut warnings = Vec::new();

    let reference = read_ident(session)?;
    for (ii, byte) in reference.iter().enumerate() {
        debug!("{}: {:X}", ii, byte);
    }
    if reference.iter().all(|&b| b == reference[0]) {
        warnings.push(IntegrityWarning::IdentBytesIdentical {
            value: reference[0],
        });
    }

    for round in 0..VERIFY_ROUNDS {
        let ident = read_ident(session)?;
        for (index, (&expected, &actual)) in reference.iter().zip(ident.iter()).enumerate() {
            if expected != actual {
                warnings.push(IntegrityWarning::IdentMismatch {
                    round,
                    index,
                    expected,
                    actual,
                });
            }
        }
    }
    verify_setup(session)?;

    for warning in &warnings {
        warn!("{}", warning);
    }
    Ok(warnings)
}
