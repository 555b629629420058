//! User defaults for the `rigport` binary, kept in `~/.rigport/config.toml`.
//!
//! The file only carries what a rig session needs before `open()`: the
//! calibration file to merge, the validation tolerances and the handshake
//! budget, plus the baseline log severity.  Every field is optional on disk.

use rigport_core::{LogSeverity, SourceConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted user configuration stored in `~/.rigport/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Calibration file merged over every rig's own calibration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration_file: Option<PathBuf>,

    /// Baseline log severity; each `-v` raises it one step.
    #[serde(default)]
    pub log_severity: LogSeverity,

    /// Validation tolerances and handshake budget.
    #[serde(default)]
    pub source: SourceConfig,
}

/// `~/.rigport/config.toml`, falling back to the working directory when no
/// home directory is known.
pub fn config_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    config_path_for_home(&home)
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rigport").join("config.toml")
}

/// Read the defaults file and apply `RIGPORT_*` overrides.  `Ok(None)` when
/// there is no file.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw =
        fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| format!("invalid rig defaults in {}: {e}", path.display()))
}

/// Apply `RIGPORT_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `RIGPORT_CALIBRATION` | `calibration_file` |
/// | `RIGPORT_HANDSHAKE_TIMEOUT_MS` | `source.handshake_timeout_ms` |
/// | `RIGPORT_TIME_TOLERANCE_NS` | `source.time_offset_tolerance_ns` |
///
/// Unparsable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("RIGPORT_CALIBRATION") {
        cfg.calibration_file = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("RIGPORT_HANDSHAKE_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.source.handshake_timeout_ms = ms;
    }
    if let Ok(v) = std::env::var("RIGPORT_TIME_TOLERANCE_NS")
        && let Ok(ns) = v.parse::<u64>()
    {
        cfg.source.time_offset_tolerance_ns = ns;
    }
}

/// Write the config to `~/.rigport/config.toml`, creating the directory.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("cannot encode rig defaults: {e}"))?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .map_err(|e| format!("cannot create {}: {e}", dir.display()))?;
    }
    fs::write(path, raw).map_err(|e| format!("cannot write {}: {e}", path.display()))
}
