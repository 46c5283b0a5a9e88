//! play: decode an audio file (local path or http(s) URL) and play it on an output device.
//!
//! ## Pipeline
//! 1. **Read**: Symphonia probes the container and hands out the audio track's packets.
//! 2. **Decode**: packets become frames in the codec's native format.
//! 3. **Convert**: frames become interleaved stereo `i16`, at the source rate unless
//!    `--output-rate` asks Rubato to convert.
//! 4. **Gain**: the volume argument (or `--gain`) scales every sample.
//! 5. **Playback**: a bounded queue feeds the CPAL callback; writes block while it is full.
//!
//! Exits 0 after the file has played out and 1 on any failure, including Ctrl-C.

mod cli;
mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use audio_player::{Pipeline, SystemBackend};
use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .init();

    let (argv, unknown) = cli::split_unknown_flags(
        std::env::args_os().map(|a| a.to_string_lossy().into_owned()),
    );
    for flag in &unknown {
        tracing::error!("unknown argument ignored: {flag}");
    }

    let args = match cli::Args::try_parse_from(argv) {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            let code = e
                .downcast_ref::<audio_player::PlayerError>()
                .map(|e| e.exit_code())
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run(args: &cli::Args) -> Result<()> {
    if args.list_devices {
        return audio_player::device::list_devices(&cpal::default_host());
    }

    let Some(cfg) = config::PlayConfig::from_args(args) else {
        anyhow::bail!("no input given");
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_signal = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || cancel_signal.store(true, Ordering::Relaxed)) {
        tracing::warn!("ctrl-c handler not installed: {e}");
    }

    let backend = SystemBackend::new(Some(cancel.clone()));
    let mut pipeline = Pipeline::new(backend, cfg.playback).with_cancel(cancel);
    let summary = pipeline.run(&cfg.input)?;

    tracing::info!(
        packets = summary.packets_read,
        skipped = summary.packets_skipped,
        frames = summary.samples_written,
        rate_hz = ?summary.output_rate,
        "playback finished"
    );
    Ok(())
}
