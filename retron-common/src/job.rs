// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Runs one complete session against the hardware: lock the FPGA port,
//! configure and verify the FPGA, power the cartridge, perform the
//! requested job, power the cartridge down and unlock.

use log::warn;
use std::io::Write;

use crate::config::Timing;
use crate::dump::{DumpProgress, DumpSummary, dump_cartridge};
use crate::error::{ErrorKind, IntegrityWarning, Result};
use crate::fpga::{Bitstream, FpgaLoader, enter_operating_mode, verify};
use crate::gpio::GpioDriver;
use crate::session::Session;

/// What to do once the cartridge is powered.
pub enum Job<'a> {
    /// Only report the cartridge status
    Probe,

    /// Set the LED register
    SetLeds(u8),

    /// Dump the cartridge, optionally forcing its length in bytes
    Dump {
        out: &'a mut dyn Write,
        force_size: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Stage {
    #[strum(to_string = "locking FPGA port")]
    Locking,
    #[strum(to_string = "Loading FPGA bitstream")]
    LoadingBitstream,
    #[strum(to_string = "Setting pin direction")]
    SettingPinDirection,
    #[strum(to_string = "Verifying FPGA")]
    Verifying,
    #[strum(to_string = "Cart power on")]
    CartPowerOn,
    #[strum(to_string = "dumping cartridge")]
    Dumping,
    #[strum(to_string = "Setting LEDs")]
    SettingLeds,
    #[strum(to_string = "Cart power off")]
    CartPowerOff,
}

/// Things an operator may want to see while a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Stage(Stage),
    CartStatus(u16),
    Progress(DumpProgress),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub cart_status: u16,
    pub warnings: Vec<IntegrityWarning>,
    pub dump: Option<DumpSummary>,
}

/// Runs a full session on `driver`.
///
/// On error the port lock is released before returning.  The cartridge is
/// powered down on success, and after a dump whose output failed while the
/// bus was still healthy.
pub fn run<D, F>(
    driver: D,
    timing: Timing,
    bitstream: &Bitstream,
    job: Job<'_>,
    mut events: F,
) -> Result<JobReport>
where
    D: GpioDriver,
    F: FnMut(Event),
{
    events(Event::Stage(Stage::Locking));
    let mut session = Session::open(driver, timing)?;

    events(Event::Stage(Stage::LoadingBitstream));
    FpgaLoader::new(&mut session).configure(bitstream)?;

    events(Event::Stage(Stage::SettingPinDirection));
    enter_operating_mode(&mut session)?;

    events(Event::Stage(Stage::Verifying));
    let warnings = verify(&mut session)?;

    events(Event::Stage(Stage::CartPowerOn));
    session.cart_on()?;
    let cart_status = session.cart_status()?;
    events(Event::CartStatus(cart_status));

    let dump = match job {
        Job::Probe => None,
        Job::SetLeds(value) => {
            events(Event::Stage(Stage::SettingLeds));
            session.set_leds(value)?;
            None
        }
        Job::Dump { out, force_size } => {
            events(Event::Stage(Stage::Dumping));
            let result = dump_cartridge(&mut session, out, force_size, |p| {
                events(Event::Progress(p))
            });
            match result {
                Ok(summary) => Some(summary),
                Err(e) => {
                    // The bus is still usable if only the sink failed
                    if !matches!(e.kind(), ErrorKind::Driver | ErrorKind::Timeout) {
                        if let Err(off) = session.cart_off() {
                            warn!("Failed to power off cartridge: {}", off);
                        }
                    }
                    return Err(e);
                }
            }
        }
    };

    events(Event::Stage(Stage::CartPowerOff));
    session.cart_off()?;
    session.close()?;

    Ok(JobReport {
        cart_status,
        warnings,
        dump,
    })
}
