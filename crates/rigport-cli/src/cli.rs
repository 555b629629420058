//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rigport_core::LogFormat;

/// Inspect and exercise sensor rigs through the sensor-source contract.
#[derive(Parser, Debug)]
#[command(name = "rigport", version, about)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "RIGPORT_LOG_FORMAT"
    )]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a rig, print its sensors, transforms and clock offsets, close it
    Inspect(SourceArgs),

    /// Open and start a rig, stream until Ctrl-C or the duration elapses
    Run(RunArgs),

    /// Print the effective configuration
    Config(ConfigArgs),
}

/// Where the rig and its extra calibration come from.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Rig description (TOML).  Defaults to the built-in stereo + IMU rig
    #[arg(long)]
    pub rig: Option<PathBuf>,

    /// Calibration file merged over the rig's own calibration
    #[arg(long)]
    pub calibration: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Stop after this many seconds (0 = until Ctrl-C)
    #[arg(long, default_value = "0")]
    pub duration_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Also save it to ~/.rigport/config.toml
    #[arg(long)]
    pub write: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatArg {
    Compact,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}
