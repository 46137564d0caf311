// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! [`GpioDriver`] implementation backed by the Retron 5 kernel driver's
//! character device.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::gpio::{GpioDriver, Port};

const IOCTL_IDENT: u32 = b'G' as u32;

// Linux _IOC encoding
const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT: u32 = 30;
const IOC_READ_WRITE: u32 = 3;

/// Equivalent of `_IOWR('G', nr, int)`
const fn iowr(nr: u32) -> u32 {
    (IOC_READ_WRITE << IOC_DIRSHIFT)
        | ((std::mem::size_of::<libc::c_int>() as u32) << IOC_SIZESHIFT)
        | (IOCTL_IDENT << IOC_TYPESHIFT)
        | (nr << IOC_NRSHIFT)
}

const IOCTL_GPIO_SET_BITS: u32 = iowr(0);
const IOCTL_GPIO_GET_BITS: u32 = iowr(1);
const IOCTL_GPIO_SET_DIRECTION: u32 = iowr(2);
const IOCTL_GPIO_ACCESS_CTRL: u32 = iowr(4);
const IOCTL_GPIO_PORT_MUTEX_OP: u32 = iowr(11);

const GPIO_ACCESS_CTRL_OFF: libc::c_int = 0;
const GPIO_ACCESS_CTRL_ON: libc::c_int = 1;

const RETRON_MUTEX_UNLOCK: libc::c_int = 0;
const RETRON_MUTEX_LOCK: libc::c_int = 1;

/// An open handle on the Retron 5 GPIO driver.
#[derive(Debug)]
pub struct Retron5Device {
    file: File,
}

impl Retron5Device {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)?;
        Ok(Self { file })
    }

    /// Grants this process access to the GPIO registers.  Must be called
    /// before any other operation.
    pub fn enable_access(&mut self) -> io::Result<()> {
        self.ioctl_value(IOCTL_GPIO_ACCESS_CTRL, GPIO_ACCESS_CTRL_ON)
    }

    pub fn disable_access(&mut self) -> io::Result<()> {
        self.ioctl_value(IOCTL_GPIO_ACCESS_CTRL, GPIO_ACCESS_CTRL_OFF)
    }

    fn ioctl_value(&mut self, request: u32, value: libc::c_int) -> io::Result<()> {
        // SAFETY: the driver takes this request's argument by value.
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, value) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Issues a request whose argument is a pointer to an int array.  The
    /// driver may write results back into the array.
    fn ioctl_args(&mut self, request: u32, args: &mut [libc::c_int]) -> io::Result<()> {
        // SAFETY: `args` is a live, exclusively borrowed buffer sized for
        // the request.
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, args.as_mut_ptr()) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl GpioDriver for Retron5Device {
    fn set_bits(&mut self, port: Port, mask: u16, value: u16) -> io::Result<()> {
        let mut args = [port.id(), mask as libc::c_int, value as libc::c_int];
        self.ioctl_args(IOCTL_GPIO_SET_BITS, &mut args)
    }

    fn get_bits(&mut self, port: Port, mask: u16) -> io::Result<u16> {
        let mut args = [port.id(), mask as libc::c_int];
        self.ioctl_args(IOCTL_GPIO_GET_BITS, &mut args)?;
        Ok(args[0] as u16 & mask)
    }

    fn set_direction(&mut self, port: Port, mask: u16, outputs: u16) -> io::Result<()> {
        let mut args = [port.id(), mask as libc::c_int, outputs as libc::c_int];
        self.ioctl_args(IOCTL_GPIO_SET_DIRECTION, &mut args)
    }

    fn lock(&mut self, port: Port) -> io::Result<()> {
        let mut args = [port.id(), RETRON_MUTEX_LOCK];
        self.ioctl_args(IOCTL_GPIO_PORT_MUTEX_OP, &mut args)
    }

    fn unlock(&mut self, port: Port) -> io::Result<()> {
        let mut args = [port.id(), RETRON_MUTEX_UNLOCK];
        self.ioctl_args(IOCTL_GPIO_PORT_MUTEX_OP, &mut args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ioctl_numbers() {
        assert_eq!(IOCTL_GPIO_SET_BITS, 0xC004_4700);
        assert_eq!(IOCTL_GPIO_GET_BITS, 0xC004_4701);
        assert_eq!(IOCTL_GPIO_SET_DIRECTION, 0xC004_4702);
        assert_eq!(IOCTL_GPIO_ACCESS_CTRL, 0xC004_4704);
        assert_eq!(IOCTL_GPIO_PORT_MUTEX_OP, 0xC004_470B);
    }

    #[test]
    fn test_open_missing_device() {
        assert!(Retron5Device::open(Path::new("/nonexistent/retron5")).is_err());
    }
}
