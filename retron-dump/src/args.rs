// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use clap::{ArgAction, Parser};
use std::path::PathBuf;

use retron_common::Settings;

#[derive(Debug)]
pub struct Args {
    pub command: Command,
    pub config: Option<PathBuf>,
    pub device: Option<PathBuf>,
    pub bitstream: Option<PathBuf>,
    pub verbose: u8,
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Dump {
        output: PathBuf,
        force_size: Option<u32>,
    },
    SetLeds(u8),
    Status,
}

#[derive(Parser, Debug)]
#[command(name = "retron-dump")]
#[command(about = "Retron 5 cartridge dumper")]
#[command(version)]
struct Cli {
    /// File to write the cartridge image to
    output: Option<PathBuf>,

    /// Dump this many bytes, ignoring the cartridge header
    /// (decimal, or hex with a 0x or $ prefix)
    #[arg(short, long, value_parser = parse_size, requires = "output", verbatim_doc_comment)]
    force_size: Option<u32>,

    /// Set the LEDs to this value (in hex, e.g. 0F) instead of dumping
    #[arg(short, long, value_parser = parse_hex_byte, conflicts_with_all = ["output", "status"])]
    led: Option<u8>,

    /// Only report the cartridge status (the default with no OUTPUT)
    #[arg(short, long, conflicts_with = "output")]
    status: bool,

    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// GPIO device node (overrides the settings file)
    #[arg(long)]
    device: Option<PathBuf>,

    /// FPGA bitstream (overrides the settings file)
    #[arg(long)]
    bitstream: Option<PathBuf>,

    /// Increase logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn strip_hex_prefix(s: &str) -> Option<&str> {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .or_else(|| s.strip_prefix('$'))
}

fn parse_hex_byte(s: &str) -> Result<u8, String> {
    let cleaned = strip_hex_prefix(s).unwrap_or(s);
    u8::from_str_radix(cleaned, 16).map_err(|_| format!("Invalid LED value: {} (00 to FF)", s))
}

fn parse_size(s: &str) -> Result<u32, String> {
    let size = match strip_hex_prefix(s) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    }
    .map_err(|_| format!("Invalid size: {}", s))?;
    if size == 0 {
        return Err("Size must be greater than zero".to_string());
    }
    Ok(size)
}

impl Args {
    fn from_cli(cli: Cli) -> Args {
        let command = match (cli.led, cli.output) {
            (Some(value), _) => Command::SetLeds(value),
            (None, Some(output)) if !cli.status => Command::Dump {
                output,
                force_size: cli.force_size,
            },
            _ => Command::Status,
        };

        Args {
            command,
            config: cli.config,
            device: cli.device,
            bitstream: cli.bitstream,
            verbose: cli.verbose,
        }
    }

    /// Builds the effective settings: the settings file if given, otherwise
    /// the defaults, then any command line overrides.
    pub fn settings(&self) -> retron_common::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load_from_file(path)?,
            None => Settings::default(),
        };
        if let Some(device) = &self.device {
            settings.device = device.clone();
        }
        if let Some(bitstream) = &self.bitstream {
            settings.bitstream = bitstream.clone();
        }
        Ok(settings)
    }
}

pub fn parse_args() -> Args {
    Args::from_cli(Cli::parse())
}
