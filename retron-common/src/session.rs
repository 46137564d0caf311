// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! An exclusive session on the FPGA port.
//!
//! Holds the port mutex for its whole lifetime, so every layer above can
//! assume the lock is held.  Dropping a session that was not closed
//! releases the lock, which is how error paths give the port back.

use log::{debug, error};
use std::time::Duration;

use crate::bus::{BusDirection, DirectionCache};
use crate::config::Timing;
use crate::error::{Error, Result};
use crate::gpio::{GpioDriver, Port};
use crate::lines::Lines;

pub struct Session<D: GpioDriver> {
    driver: D,
    port: Port,
    direction: DirectionCache,
    timing: Timing,
    locked: bool,
}

impl<D: GpioDriver> Session<D> {
    /// Locks the FPGA port and returns a session holding it.
    pub fn open(driver: D, timing: Timing) -> Result<Self> {
        Self::open_port(driver, Port::Fpga, timing)
    }

    pub fn open_port(mut driver: D, port: Port, timing: Timing) -> Result<Self> {
        driver
            .lock(port)
            .map_err(|err| Error::Lock { port, err })?;
        debug!("Locked port {}", port);
        Ok(Self {
            driver,
            port,
            direction: DirectionCache::default(),
            timing,
            locked: true,
        })
    }

    /// Releases the port lock, reporting any failure to do so.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if !self.locked {
            return Ok(());
        }
        // Only one attempt is ever made, even if it fails
        self.locked = false;
        self.driver.unlock(self.port).map_err(|err| Error::Unlock {
            port: self.port,
            err,
        })?;
        debug!("Unlocked port {}", self.port);
        Ok(())
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn direction(&self) -> Option<BusDirection> {
        self.direction.current()
    }

    pub fn set_bits(&mut self, mask: u16, value: u16) -> Result<()> {
        let port = self.port;
        self.driver
            .set_bits(port, mask, value)
            .map_err(|err| Error::Driver {
                op: "set GPIO bits",
                port,
                err,
            })
    }

    pub fn get_bits(&mut self, mask: u16) -> Result<u16> {
        let port = self.port;
        self.driver
            .get_bits(port, mask)
            .map_err(|err| Error::Driver {
                op: "get GPIO bits",
                port,
                err,
            })
    }

    pub fn set_direction(&mut self, mask: u16, outputs: u16) -> Result<()> {
        let port = self.port;
        self.driver
            .set_direction(port, mask, outputs)
            .map_err(|err| Error::Driver {
                op: "set GPIO direction",
                port,
                err,
            })
    }

    /// Drives `lines` high (`high == true`) or low.
    pub fn set_lines(&mut self, lines: Lines, high: bool) -> Result<()> {
        let value = if high { lines.bits() } else { 0 };
        self.set_bits(lines.bits(), value)
    }

    pub fn read_lines(&mut self, lines: Lines) -> Result<Lines> {
        self.get_bits(lines.bits()).map(Lines::from_bits_retain)
    }

    pub fn ensure_read(&mut self) -> Result<()> {
        self.ensure_direction(BusDirection::Read)
    }

    pub fn ensure_write(&mut self) -> Result<()> {
        self.ensure_direction(BusDirection::Write)
    }

    fn ensure_direction(&mut self, wanted: BusDirection) -> Result<()> {
        let before = self.direction;
        if let Some(dir) = self.direction.transition(wanted) {
            if let Err(e) = self.set_direction(Lines::DATA.bits(), dir.outputs()) {
                self.direction = before;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Polls until every line in `lines` reads low.  Returns false if they
    /// were still set after `max` polls.
    pub fn wait_low(&mut self, lines: Lines, max: u32) -> Result<bool> {
        for _ in 0..max {
            if self.get_bits(lines.bits())? == 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Polls until any line in `lines` reads high.  Returns false if none
    /// was set after `max` polls.
    pub fn wait_high(&mut self, lines: Lines, max: u32) -> Result<bool> {
        for _ in 0..max {
            if self.get_bits(lines.bits())? != 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn delay(&self) {
        let delay = self.timing.handshake_delay();
        if delay > Duration::ZERO {
            std::thread::sleep(delay);
        }
    }
}

impl<D: GpioDriver> Drop for Session<D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            error!("{}", e);
        }
    }
}
