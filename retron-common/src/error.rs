// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::gpio::Port;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`], used by callers to decide how to
/// report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An ioctl against the host driver failed
    Driver,

    /// A bounded poll ran out before the peripheral responded
    Timeout,

    /// The FPGA rejected or never completed its configuration
    Configuration,

    /// A file or setting supplied by the operator was unusable
    Input,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to {op} on port {port}: {err}")]
    Driver {
        op: &'static str,
        port: Port,
        err: io::Error,
    },

    #[error("Failed to lock port {port}: {err}")]
    Lock {
        port: Port,
        err: io::Error,
    },

    #[error("Failed to unlock port {port}: {err}")]
    Unlock {
        port: Port,
        err: io::Error,
    },

    #[error("Timed out waiting for {what} after {polls} polls")]
    Timeout { what: &'static str, polls: u32 },

    #[error("Failed to reset FPGA: INIT_B did not go {level} within {polls} polls")]
    FpgaReset { level: &'static str, polls: u32 },

    #[error("FPGA signaled CRC error")]
    Crc,

    #[error("FPGA failed to set DONE bit within {polls} clocks")]
    DoneTimeout { polls: u32 },

    #[error("Could not open FPGA bitstream from {}: {err}", path.display())]
    Bitstream {
        path: PathBuf,
        err: io::Error,
    },

    #[error("Invalid settings in {}: {reason}", path.display())]
    Settings { path: PathBuf, reason: String },

    #[error("Failed to write cartridge image: {0}")]
    Output(io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Driver { .. } | Error::Lock { .. } | Error::Unlock { .. } => ErrorKind::Driver,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::FpgaReset { .. } | Error::Crc | Error::DoneTimeout { .. } => {
                ErrorKind::Configuration
            }
            Error::Bitstream { .. } | Error::Settings { .. } | Error::Output(_) => {
                ErrorKind::Input
            }
        }
    }
}

/// Consistency problems that the hardware is known to report spuriously.
/// These are surfaced to the operator but never abort a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityWarning {
    /// Every byte of the identify response had the same value
    #[error("All verification bytes are the same ({value:X})")]
    IdentBytesIdentical { value: u8 },

    /// A repeated identify response differed from the first one
    #[error(
        "Verification mismatch (round {round}, byte {index}): Expected {expected:X}, but got {actual:X}"
    )]
    IdentMismatch {
        round: usize,
        index: usize,
        expected: u8,
        actual: u8,
    },
}
