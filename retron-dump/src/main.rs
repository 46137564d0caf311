// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! retron-dump
//!
//! Dumps Mega Drive cartridges using the cartridge reader built into a
//! Retron 5.  Loads the reader's FPGA bitstream, checks the FPGA responds,
//! powers up the cartridge and streams its contents to a file.  Can also
//! just report the cartridge status, or set the console's LEDs.

mod args;

use anyhow::{Context, Result};
use log::warn;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use args::{Command, parse_args};
use retron_common::{Bitstream, Error, Event, Job, Retron5Device, run};

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn report_event(event: Event) {
    match event {
        Event::Stage(stage) => println!("{}", stage),
        Event::CartStatus(status) => println!("Cart status: {:X}", status),
        Event::Progress(progress) => {
            print!("\r{}%", progress.percent());
            let _ = io::stdout().flush();
        }
    }
}

fn main() -> Result<()> {
    let args = parse_args();
    init_logging(args.verbose);

    let settings = args.settings()?;

    // Anything that can fail without touching the hardware is done first
    let bitstream = Bitstream::load_from_file(&settings.bitstream)?;
    let mut output = match &args.command {
        Command::Dump { output, .. } => {
            let file = File::create(output)
                .with_context(|| format!("Could not open output file {}", output.display()))?;
            Some(BufWriter::new(file))
        }
        _ => None,
    };

    let mut device = Retron5Device::open(&settings.device)
        .with_context(|| format!("Could not open {}", settings.device.display()))?;
    device
        .enable_access()
        .context("Failed to enable GPIO access")?;

    let job = match (&args.command, output.as_mut()) {
        (Command::Dump { force_size, .. }, Some(out)) => Job::Dump {
            out,
            force_size: *force_size,
        },
        (Command::SetLeds(value), _) => Job::SetLeds(*value),
        _ => Job::Probe,
    };

    let result = run(
        &mut device,
        settings.timing.clone(),
        &bitstream,
        job,
        report_event,
    );
    if let Err(Error::Lock { .. }) = &result {
        if let Err(e) = device.disable_access() {
            warn!("Failed to disable GPIO access: {}", e);
        }
    }
    let report = result?;

    if let (Some(summary), Command::Dump { output: path, .. }) = (&report.dump, &args.command) {
        if let Some(mut out) = output.take() {
            out.flush()
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        println!("\nDONE");
        if summary.title_ssf2 {
            println!("Super Street Fighter II detected, dumped extra bank");
        }
        println!("Wrote {} bytes to {}", summary.bytes_written, path.display());
    }
    if !report.warnings.is_empty() {
        println!("{} verification warning(s), dump may be unreliable", report.warnings.len());
    }

    Ok(())
}
