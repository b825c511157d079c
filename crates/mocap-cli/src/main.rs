//! `mocap-cli` – the `mocap-relay` binary.
//!
//! 1. Resolves the [`RelayConfig`][config::RelayConfig] from defaults, the
//!    TOML file, `MOCAP_*` env-vars and command-line flags, and refuses to
//!    start without the local and server addresses.
//! 2. Starts the frame receiver (UDP listener or simulated stream) feeding a
//!    shared frame buffer.
//! 3. Runs either the relay loop, publishing every rigid body on its
//!    `MOCAP#<n>` channel, or the arrival histogram.
//! 4. Intercepts **Ctrl-C** to clear the run flag, then stops and joins the
//!    receiver before exiting.

mod cli;
mod config;

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing::{info, warn};

use mocap_hal::{FrameBuffer, ListenerConfig, ReceiverThread, SimulatedStream, UdpFrameListener};
use mocap_middleware::UdpPublisher;
use mocap_runtime::{
    ArrivalHistogram, HistogramLoop, RelayLoop, RelayLoopConfig, RunFlag, ThreadSleeper,
    init_tracing,
};
use mocap_types::RelayError;

use crate::cli::Cli;
use crate::config::{Mode, RelayConfig, SourceKind};

const HISTOGRAM_BANNER: &str =
    "Collecting inter-frame arrival statistics...press ctrl-c to finish.";

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too.
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    if cli.save_config {
        return save_config(&cli);
    }

    let cfg = match resolve_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red().bold(), e);
            eprintln!("  Run `{}` for usage.", "mocap-relay --help".bold());
            return ExitCode::FAILURE;
        }
    };

    // ── Structured logging ────────────────────────────────────────────────
    let _guard = init_tracing("mocap-relay", cfg.log_format);

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let run = RunFlag::new();
    let handler_flag = run.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if handler_flag.stop() {
            eprintln!();
            eprintln!("{}", "Ctrl-C received, shutting down …".yellow().bold());
        }
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; the relay can only be stopped by killing it");
    }

    match execute(&cfg, &run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(RelayError::TransportUnhealthy(details)) => {
            eprintln!("{}: {}", "Publisher unhealthy".red().bold(), details);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<RelayConfig, RelayError> {
    let mut cfg = config::load_layered(cli.config.as_deref())?;
    cli.apply_to(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Write the file, env and flag layers merged, without validating, so a
/// partial config can be saved and completed later.
fn save_config(cli: &Cli) -> ExitCode {
    let path = cli.config.clone().unwrap_or_else(config::config_path);
    let mut cfg = match config::load_from(&path) {
        Ok(existing) => existing.unwrap_or_default(),
        Err(e) => {
            eprintln!("{}: {}", "Config error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    config::apply_env_overrides(&mut cfg);
    cli.apply_to(&mut cfg);
    match config::save_to(&cfg, &path) {
        Ok(()) => {
            println!("  {} Config saved to {}", "✓".green().bold(), path.display().to_string().bold());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error saving config".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cfg: &RelayConfig, run: &RunFlag) -> Result<(), RelayError> {
    execute_with(cfg, FrameBuffer::new(cfg.buffer_capacity), run)
}

/// Start the receiver feeding `buffer`, run the selected loop, then wind the
/// receiver down.  The receiver is joined whether or not the loop failed.
fn execute_with(cfg: &RelayConfig, buffer: FrameBuffer, run: &RunFlag) -> Result<(), RelayError> {
    info!(mode = %cfg.mode, source = %cfg.source, "starting mocap relay");
    let receiver = start_receiver(cfg, buffer.clone())?;

    let outcome = match cfg.mode {
        Mode::Relay => run_relay(cfg, buffer.clone(), run),
        Mode::Histogram => run_histogram(cfg, buffer.clone(), run),
    };

    // A fatal loop error must still release the socket and thread.
    run.stop();
    receiver.join()?;
    if buffer.dropped() > 0 {
        warn!(dropped = buffer.dropped(), pushed = buffer.pushed(), "frames were dropped while the buffer was full");
    }
    outcome
}

fn start_receiver(cfg: &RelayConfig, buffer: FrameBuffer) -> Result<ReceiverThread, RelayError> {
    match cfg.source {
        SourceKind::Network => {
            let (Some(local), Some(server)) = (cfg.local_addr, cfg.server_addr) else {
                return Err(RelayError::Config(
                    "local and server addresses are required".to_string(),
                ));
            };
            let listener_cfg = ListenerConfig {
                data_port: cfg.data_port,
                multicast_group: cfg.multicast_group,
                ..ListenerConfig::new(local, server)
            };
            Ok(UdpFrameListener::start(listener_cfg, buffer)?.into_receiver())
        }
        SourceKind::Sim => SimulatedStream::spawn(buffer, cfg.sim_bodies, cfg.sim_period()),
    }
}

fn run_relay(cfg: &RelayConfig, buffer: FrameBuffer, run: &RunFlag) -> Result<(), RelayError> {
    let publisher = UdpPublisher::connect(cfg.publish_addr)?;
    info!(destination = %publisher.destination(), "publishing poses");

    let loop_cfg = RelayLoopConfig {
        poll_interval: cfg.poll_interval(),
        echo_frames: cfg.echo_frames,
    };
    let mut relay = RelayLoop::new(buffer, publisher, loop_cfg);
    let stats = relay.run(run)?;
    info!(
        frames = stats.frames,
        published = stats.published,
        publish_failures = stats.publish_failures,
        sent = relay.publisher().sent(),
        "relay finished"
    );
    Ok(())
}

fn run_histogram(cfg: &RelayConfig, buffer: FrameBuffer, run: &RunFlag) -> Result<(), RelayError> {
    let histogram = ArrivalHistogram::new(cfg.histogram)?;
    eprintln!("{HISTOGRAM_BANNER}");

    let mut histogram_loop = HistogramLoop::with_sleeper(
        buffer,
        histogram,
        ThreadSleeper,
        cfg.poll_interval(),
    );
    let histogram = histogram_loop.run(run);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    histogram.write_report(&mut out)?;
    out.flush()?;
    Ok(())
}
