/*
 *  main.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use env_logger::Env;
use log::{error, info, warn};
use tokio::signal::unix::{signal, SignalKind};

use vfdmon::audio::open_source;
use vfdmon::config::{self, Config, TransportConfig};
use vfdmon::display::{BoxedTransport, DisplayMode, MockTransport, SpidevTransport, VfdDisplay};
use vfdmon::keyboard::{mailbox, KeyReceiver, KeySource, StdinKeys};
use vfdmon::metrics::ProcMetrics;
use vfdmon::modes;
use vfdmon::session::Session;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// How long a worker gets to notice the stop flag before we tear down anyway
const WORKER_GRACE: Duration = Duration::from_secs(2);

/// Asynchronously waits for a SIGINT, SIGTERM, or SIGHUP signal.
async fn signal_handler() -> anyhow::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

fn build_transport(cfg: &Config) -> BoxedTransport {
    match cfg.transport() {
        TransportConfig::Spidev { device, .. } => Box::new(SpidevTransport::new(&device, cfg.spi_speed_hz())),
        TransportConfig::Mock => {
            info!("dry run: no hardware, frames logged at debug");
            Box::new(MockTransport::echoing())
        }
    }
}

/// Keys are read on their own thread and posted into the mailbox
fn start_keys(stop: Arc<AtomicBool>) -> anyhow::Result<(KeyReceiver, std::thread::JoinHandle<()>)> {
    let (tx, rx) = mailbox();
    let handle = std::thread::Builder::new()
        .name("vfd-keys".into())
        .spawn(move || {
            StdinKeys::new().run(&tx, &stop);
            // a closed source or a cancel key both end the run
            stop.store(true, Ordering::Relaxed);
        })
        .context("starting key reader")?;
    Ok((rx, handle))
}

fn run_mode(cfg: &Config, display: VfdDisplay, stop: Arc<AtomicBool>, keys: Option<KeyReceiver>) -> anyhow::Result<()> {
    match (cfg.mode(), keys) {
        (DisplayMode::Spectrum, _) => {
            let settings = cfg.spectrum_settings()?;
            let source = cfg.audio_source();
            let mut audio = open_source(&source, cfg.sample_rate(), cfg.channels(), cfg.chunk_frames())
                .with_context(|| format!("opening audio source {source}"))?;
            modes::run_spectrum(&display, audio.as_mut(), &settings, &stop);
        }
        (DisplayMode::Metrics, _) => {
            let mut source = ProcMetrics::new();
            modes::run_metrics(&display, &mut source, cfg.metrics_interval(), &stop);
        }
        (DisplayMode::Keyboard, Some(keys)) => {
            modes::run_keyboard(&display, keys, cfg.dimmer_config(), &stop);
        }
        (DisplayMode::Scan, Some(keys)) => {
            modes::run_scan(&display, keys, cfg.scan_grid(), &stop)?;
        }
        (mode, None) => anyhow::bail!("{:?} mode needs a key source", mode),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;

    // Initialize the logger; RUST_LOG still wins over the configured level
    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_filter()))
        .format_timestamp_secs()
        .init();

    info!("{} v.{} built {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), BUILD_DATE);
    info!("mode {:?}", cfg.mode());

    let session = Session::start(build_transport(&cfg)).context("display initialisation failed")?;
    let stop = session.stop_flag();

    let (keys, key_thread) = match cfg.mode() {
        DisplayMode::Keyboard | DisplayMode::Scan => {
            let (rx, handle) = start_keys(Arc::clone(&stop))?;
            (Some(rx), Some(handle))
        }
        _ => (None, None),
    };

    // a std thread rather than spawn_blocking: one parked in a read must not hold up exit
    let (done_tx, mut done_rx) = tokio::sync::oneshot::channel();
    {
        let cfg = cfg.clone();
        let display = session.display().clone();
        let stop = Arc::clone(&stop);
        std::thread::Builder::new()
            .name("vfd-worker".into())
            .spawn(move || {
                let _ = done_tx.send(run_mode(&cfg, display, stop, keys));
            })
            .context("starting worker")?;
    }

    let finished = tokio::select! {
        res = signal_handler() => {
            if let Err(e) = res {
                error!("signal handler failed: {}", e);
            }
            None
        }
        done = &mut done_rx => Some(done),
    };

    let outcome = match finished {
        Some(done) => done,
        None => {
            session.request_stop();
            match tokio::time::timeout(WORKER_GRACE, &mut done_rx).await {
                Ok(done) => done,
                Err(_) => {
                    // likely parked in a blocking audio read
                    warn!("worker did not stop within {:?}", WORKER_GRACE);
                    Ok(Ok(()))
                }
            }
        }
    };

    session.request_stop();
    if let Some(handle) = key_thread {
        if handle.join().is_err() {
            warn!("key reader panicked");
        }
    }
    // clears and closes the display
    drop(session);

    match outcome {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("worker exited without a result")),
    }
}
