// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Session settings, optionally loaded from a JSON file.
//!
//! The polling bounds are part of the FPGA protocol: they count register
//! round trips, not wall-clock time.  They are only configurable so a
//! simulated peripheral can be driven with small bounds.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_DEVICE: &str = "/dev/retron5";
pub const DEFAULT_BITSTREAM: &str = "/mnt/sdcard/retron.fpga";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timing {
    /// Polls of INIT_B going low after PROG_B is asserted
    pub reset_low_polls: u32,

    /// Polls of INIT_B going high after PROG_B is released
    pub reset_high_polls: u32,

    /// Clock cycles to wait for DONE after the bitstream is sent
    pub done_polls: u32,

    /// Extra clock cycles once DONE is seen
    pub startup_clocks: u32,

    /// Polls of the ready line per handshake read phase
    pub read_polls: u32,

    /// Settle time either side of a busy strobe, in microseconds
    pub handshake_delay_us: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            reset_low_polls: 100,
            reset_high_polls: 1_000_000,
            done_polls: 100,
            startup_clocks: 100,
            read_polls: 1000,
            handshake_delay_us: 50,
        }
    }
}

impl Timing {
    pub fn handshake_delay(&self) -> Duration {
        Duration::from_micros(self.handshake_delay_us)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Host driver character device
    pub device: PathBuf,

    /// FPGA configuration bitstream
    pub bitstream: PathBuf,

    pub timing: Timing,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            bitstream: PathBuf::from(DEFAULT_BITSTREAM),
            timing: Timing::default(),
        }
    }
}

impl Settings {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Settings {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let settings: Settings = serde_json::from_str(&content).map_err(|e| Error::Settings {
            path: path.to_path_buf(),
            reason: format!("Failed to parse JSON: {}", e),
        })?;
        settings.validate().map_err(|reason| Error::Settings {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(settings)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let t = &self.timing;
        for (name, value) in [
            ("reset_low_polls", t.reset_low_polls),
            ("reset_high_polls", t.reset_high_polls),
            ("done_polls", t.done_polls),
            ("read_polls", t.read_polls),
        ] {
            if value == 0 {
                return Err(format!("{} must be greater than 0", name));
            }
        }
        Ok(())
    }
}
