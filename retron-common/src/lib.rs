// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! retron-common
//!
//! Drives the FPGA-mediated cartridge reader in a Retron 5 through the GPIO
//! interface exposed by its kernel driver (`/dev/retron5`).
//!
//! The layers, from the bottom up:
//! - [`gpio`] - masked register access and the port mutex ([`GpioDriver`]),
//!   implemented for the real device by [`device::Retron5Device`]
//! - [`session`] - an exclusively locked port plus the data bus direction
//!   cache
//! - [`transport`] - clocked bitstream writes and handshaked byte transfers
//! - [`fpga`] - FPGA configuration and verification
//! - [`protocol`] - the command language spoken by the configured FPGA
//! - [`dump`] - cartridge size detection and image streaming
//! - [`job`] - a complete session, from lock to unlock
//!
//! Typically used like this:
//!
//! ```rust ignore
//! use retron_common::{Bitstream, Job, Retron5Device, Settings, run};
//! let settings = Settings::default();
//! let bitstream = Bitstream::load_from_file(&settings.bitstream)?;
//! let mut device = Retron5Device::open(&settings.device)?;
//! device.enable_access()?;
//! let report = run(&mut device, settings.timing, &bitstream, Job::Probe, |_| {})?;
//! ```

pub mod bus;
pub mod config;
pub mod device;
pub mod dump;
pub mod error;
pub mod fpga;
pub mod gpio;
pub mod job;
pub mod lines;
pub mod protocol;
pub mod session;
pub mod transport;

#[cfg(test)]
mod sim;

pub use config::{Settings, Timing};
pub use device::Retron5Device;
pub use dump::{CartHeader, DumpProgress, DumpSummary};
pub use error::{Error, ErrorKind, IntegrityWarning, Result};
pub use fpga::Bitstream;
pub use gpio::{GpioDriver, Port};
pub use job::{Event, Job, JobReport, Stage, run};
pub use session::Session;
