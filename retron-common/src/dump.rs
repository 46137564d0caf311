// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Streams a Mega Drive cartridge image out of the console's address space.
//!
//! The first block holds the cartridge header, which gives the ROM length.
//! A couple of empirical corrections are applied to that length before
//! the rest of the cartridge is read in fixed-size chunks.

use log::{debug, info, warn};
use static_assertions::const_assert;
use std::io::Write;

use crate::error::{Error, Result};
use crate::gpio::GpioDriver;
use crate::session::Session;

/// Size of the header block and of every subsequent read
pub const CHUNK_SIZE: usize = 0x800;

/// Offset of the big-endian ROM end address (length minus one)
pub const LENGTH_OFFSET: usize = 0x1A4;

/// Offset of the domestic title
pub const TITLE_OFFSET: usize = 0x120;

/// Title of the cartridge whose header under-reports its size
pub const SSF2_TITLE: &[u8; 21] = b"SUPER STREET FIGHTER2";

/// Largest size trusted from a header without an explicit override
pub const MAX_HEADER_LENGTH: u32 = 4 * 1024 * 1024;

/// Extra ROM present on the SSF2 cartridge beyond its header length
pub const SSF2_EXTRA: u32 = 1024 * 1024;

const_assert!(LENGTH_OFFSET + 4 <= CHUNK_SIZE);
const_assert!(TITLE_OFFSET + SSF2_TITLE.len() <= CHUNK_SIZE);

/// The cartridge header block, as read from address 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartHeader {
    block: [u8; CHUNK_SIZE],
}

impl CartHeader {
    pub fn new(block: [u8; CHUNK_SIZE]) -> Self {
        Self { block }
    }

    pub fn bytes(&self) -> &[u8; CHUNK_SIZE] {
        &self.block
    }

    /// ROM length declared by the header.  The header stores the last
    /// address, so this is that value plus one.
    pub fn declared_length(&self) -> u32 {
        let end = u32::from_be_bytes([
            self.block[LENGTH_OFFSET],
            self.block[LENGTH_OFFSET + 1],
            self.block[LENGTH_OFFSET + 2],
            self.block[LENGTH_OFFSET + 3],
        ]);
        end.wrapping_add(1)
    }

    pub fn is_ssf2(&self) -> bool {
        &self.block[TITLE_OFFSET..TITLE_OFFSET + SSF2_TITLE.len()] == SSF2_TITLE
    }

    /// Decides how many bytes to dump.
    ///
    /// An explicit `force_size` always wins.  Otherwise SSF2 gets its
    /// missing megabyte, and anything claiming more than 4 MiB is assumed
    /// to be a corrupt header and clamped.
    pub fn dump_length(&self, force_size: Option<u32>) -> u32 {
        let length = self.declared_length();
        let adjusted = if length == MAX_HEADER_LENGTH && self.is_ssf2() {
            length + SSF2_EXTRA
        } else if length > MAX_HEADER_LENGTH {
            MAX_HEADER_LENGTH
        } else {
            length
        };

        match force_size {
            Some(forced) => {
                warn!(
                    "Size of {} bytes read from header, forcing {}",
                    length, forced
                );
                forced
            }
            None => {
                if adjusted < length {
                    warn!(
                        "Size of {} bytes read from header, forcing {}",
                        length, adjusted
                    );
                }
                adjusted
            }
        }
    }
}

/// Progress through a dump, reported after each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpProgress {
    /// Bytes written so far
    pub done: u32,

    /// Total bytes to write
    pub total: u32,
}

impl DumpProgress {
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        (100 * self.done as u64 / self.total as u64) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpSummary {
    pub declared_length: u32,
    pub length: u32,
    pub chunks: usize,
    pub bytes_written: u64,
    pub title_ssf2: bool,
}

/// Dumps the cartridge in the console slot to `out`.
///
/// The cartridge must already be powered; this selects Mega Drive mode,
/// reads the header and then sweeps the rest of the ROM in order.
/// `progress` is called after every chunk written.
pub fn dump_cartridge<D, W, F>(
    session: &mut Session<D>,
    out: &mut W,
    force_size: Option<u32>,
    mut progress: F,
) -> Result<DumpSummary>
where
    D: GpioDriver,
    W: Write + ?Sized,
    F: FnMut(DumpProgress),
{
    info!("Setting up for MD reads");
    session.setup_console()?;

    let mut buf = [0u8; CHUNK_SIZE];
    session.read_range_swapped(&mut buf, 0)?;
    let header = CartHeader::new(buf);

    let length = header.dump_length(force_size);
    info!("Cartridge size is {:X}", length);

    let first = (length as usize).min(CHUNK_SIZE);
    out.write_all(&header.bytes()[..first]).map_err(Error::Output)?;
    let mut chunks = 1;
    let mut written = first as u64;

    let mut address = CHUNK_SIZE as u32;
    while address < length {
        progress(DumpProgress {
            done: address,
            total: length,
        });
        let size = CHUNK_SIZE.min((length - address) as usize);
        session.read_range_swapped(&mut buf[..size], address)?;
        out.write_all(&buf[..size]).map_err(Error::Output)?;
        chunks += 1;
        written += size as u64;
        address += size as u32;
    }
    out.flush().map_err(Error::Output)?;
    progress(DumpProgress {
        done: written as u32,
        total: length,
    });
    debug!("Dumped {} bytes in {} chunks", written, chunks);

    Ok(DumpSummary {
        declared_length: header.declared_length(),
        length,
        chunks,
        bytes_written: written,
        title_ssf2: header.is_ssf2(),
    })
}
