//! `rigport` – sensor rig command line interface.
//!
//! 1. Loads `~/.rigport/config.toml` (defaults when absent) and applies
//!    `RIGPORT_*` overrides.
//! 2. Initialises logging through an [`SdkContext`], held until exit.
//! 3. Builds a sensor source from a rig description (or the built-in
//!    stereo + IMU simulator) plus an optional calibration file.
//! 4. `inspect` prints what the source knows; `run` opens, starts, streams
//!    until Ctrl-C or the duration elapses, then stops and closes.

mod cli;
mod config;
mod report;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use colored::Colorize;
use rigport_calib::CalibrationData;
use rigport_core::{RigSensorSource, SdkContext, SdkOptions, SensorSource};
use rigport_hal::{RigDescription, SimDevice, SimRig};
use tracing::{info, warn};

use cli::{Cli, Commands, ConfigArgs, RunArgs, SourceArgs};
use config::Config;
use report::Report;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let (cfg, config_error) = load_config();

    // ── Structured logging ────────────────────────────────────────────────
    let options = SdkOptions {
        service_name: "rigport".to_string(),
        severity: cfg.log_severity.raised_by(cli.verbose),
        format: cli.log_format.into(),
    };
    let context = match SdkContext::init(options) {
        Ok(context) => Some(context),
        Err(e) => {
            eprintln!("{}: {e}", "Logging unavailable".yellow());
            None
        }
    };
    if let Some(e) = config_error {
        warn!(error = %e, "config unreadable; using defaults");
    }

    let result = match cli.command {
        Commands::Inspect(args) => inspect(&args, &cfg),
        Commands::Run(args) => run(&args, &cfg),
        Commands::Config(args) => show_config(&args, &cfg),
    };

    if let Some(context) = context {
        context.deinit();
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> (Config, Option<String>) {
    match config::load() {
        Ok(Some(cfg)) => (cfg, None),
        Ok(None) => (defaults_with_env(), None),
        Err(e) => (defaults_with_env(), Some(e)),
    }
}

fn defaults_with_env() -> Config {
    let mut cfg = Config::default();
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Source construction
// ─────────────────────────────────────────────────────────────────────────────

fn build_source(args: &SourceArgs, cfg: &Config) -> Result<RigSensorSource, String> {
    let device = match &args.rig {
        Some(path) => {
            let description = RigDescription::load(path)
                .map_err(|e| format!("rig description {}: {e}", path.display()))?;
            SimDevice::from_description(description)
        }
        None => SimRig::stereo_imu().build(),
    };
    let mut source = RigSensorSource::new(device, cfg.source.clone());

    if let Some(path) = args.calibration.as_ref().or(cfg.calibration_file.as_ref()) {
        let data = CalibrationData::load(path)
            .map_err(|e| format!("calibration file {}: {e}", path.display()))?;
        info!(
            path = %path.display(),
            transforms = data.transforms.len(),
            time_offsets = data.time_offsets.len(),
            "calibration file loaded"
        );
        source = source.with_calibration(data);
    }
    Ok(source)
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn inspect(args: &SourceArgs, cfg: &Config) -> Result<(), String> {
    let source = build_source(args, cfg)?;
    source.open().map_err(|e| format!("open failed: {e}"))?;

    let frames = source.frames().map_err(|e| e.to_string())?;
    print!("{}", Report::collect(&source, &frames).render());
    if let Some(session) = source.session_info() {
        println!(
            "\n  {} {} opened at {}",
            "Session".bold(),
            session.id.to_string().dimmed(),
            session.opened_at.to_rfc3339()
        );
        if !session.inconsistent_sensors.is_empty() {
            let names: Vec<String> = session
                .inconsistent_sensors
                .iter()
                .map(ToString::to_string)
                .collect();
            println!(
                "  {} {}",
                "Inconsistent clock cycle through".yellow(),
                names.join(", ")
            );
        }
    }
    println!();

    source.close().map_err(|e| format!("close failed: {e}"))
}

fn run(args: &RunArgs, cfg: &Config) -> Result<(), String> {
    let source = build_source(&args.source, cfg)?;

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the rig …".yellow().bold());
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; use --duration-secs to stop");
    }

    source.open().map_err(|e| format!("open failed: {e}"))?;
    println!(
        "  {} {} ({} sensors)",
        "Opened".green().bold(),
        source.serial().bold(),
        source.list_sensors().len()
    );

    if let Err(e) = source.start() {
        if let Err(close_err) = source.close() {
            warn!(error = %close_err, "close after failed start");
        }
        return Err(format!("start failed: {e}"));
    }
    println!("  {} (Ctrl-C to stop)", "Streaming".green().bold());

    let started = Instant::now();
    let limit = (args.duration_secs > 0).then(|| Duration::from_secs(args.duration_secs));
    let mut last_beat = Instant::now();
    while !shutdown.load(Ordering::SeqCst) && limit.is_none_or(|l| started.elapsed() < l) {
        std::thread::sleep(Duration::from_millis(100));
        if last_beat.elapsed() >= Duration::from_secs(1) {
            info!(elapsed_secs = started.elapsed().as_secs(), "streaming");
            last_beat = Instant::now();
        }
    }

    source.stop().map_err(|e| format!("stop failed: {e}"))?;
    source.close().map_err(|e| format!("close failed: {e}"))?;
    println!(
        "  {} after {:.1}s",
        "Stopped".green().bold(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn show_config(args: &ConfigArgs, cfg: &Config) -> Result<(), String> {
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("cannot encode rig defaults: {e}"))?;
    println!("{}", raw.trim_end());
    if args.write {
        config::save(cfg)?;
        println!(
            "\n  {} Config saved to {}",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        );
    }
    Ok(())
}
