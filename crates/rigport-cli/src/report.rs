//! Tabular view of an open sensor source: sensors, pairwise transforms and
//! pairwise clock offsets.  Unavailable answers are shown by error kind.

use std::fmt::Write as _;

use colored::Colorize;
use rigport_calib::StaticTransform;
use rigport_core::SensorSource;
use rigport_types::{Nanoseconds, ReferenceFrame, SensorId, SourceError};

pub struct TransformRow {
    pub to: ReferenceFrame,
    pub from: ReferenceFrame,
    pub result: Result<StaticTransform, SourceError>,
}

pub struct OffsetRow {
    pub source: SensorId,
    pub destination: SensorId,
    pub result: Result<Nanoseconds, SourceError>,
}

pub struct Report {
    pub serial: String,
    pub sensors: Vec<(SensorId, Result<ReferenceFrame, SourceError>)>,
    pub transforms: Vec<TransformRow>,
    pub offsets: Vec<OffsetRow>,
}

impl Report {
    /// Query every sensor, every ordered pair of distinct `frames`, and every
    /// ordered pair of distinct sensors.
    pub fn collect(source: &dyn SensorSource, frames: &[ReferenceFrame]) -> Self {
        let sensors = source.list_sensors();

        let mut transforms = Vec::new();
        for &to in frames {
            for &from in frames {
                if to != from {
                    transforms.push(TransformRow {
                        to,
                        from,
                        result: source.static_transform(to, from),
                    });
                }
            }
        }

        let mut offsets = Vec::new();
        for &src in sensors {
            for &dst in sensors {
                if src != dst {
                    offsets.push(OffsetRow {
                        source: src,
                        destination: dst,
                        result: source.time_offset(src, dst),
                    });
                }
            }
        }

        Self {
            serial: source.serial().to_string(),
            sensors: sensors
                .iter()
                .map(|&s| (s, source.sensor_reference_frame(s)))
                .collect(),
            transforms,
            offsets,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n  {} {}", "Serial".bold(), self.serial.cyan());

        let _ = writeln!(out, "\n  {}", "Sensors".bold().underline());
        for (sensor, frame) in &self.sensors {
            let _ = writeln!(out, "    {:<18} {}", sensor.to_string(), cell(frame, |f| f.to_string()));
        }

        let _ = writeln!(out, "\n  {}", "Static transforms (to <- from)".bold().underline());
        for row in &self.transforms {
            let pair = format!("{} <- {}", row.to, row.from);
            let _ = writeln!(out, "    {:<26} {}", pair, cell(&row.result, describe_transform));
        }

        let _ = writeln!(out, "\n  {}", "Time offsets (source -> destination)".bold().underline());
        for row in &self.offsets {
            let pair = format!("{} -> {}", row.source, row.destination);
            let _ = writeln!(out, "    {:<36} {}", pair, cell(&row.result, |ns| format!("{ns:+} ns")));
        }
        out
    }
}

fn cell<T>(result: &Result<T, SourceError>, show: impl Fn(&T) -> String) -> String {
    match result {
        Ok(value) => show(value).green().to_string(),
        Err(e) => e.kind().yellow().to_string(),
    }
}

fn describe_transform(t: &StaticTransform) -> String {
    let [x, y, z] = t.transform.translation.to_array();
    let [qw, qx, qy, qz] = t.transform.rotation.to_array();
    format!("t=[{x:+.4}, {y:+.4}, {z:+.4}] q=[{qw:+.4}, {qx:+.4}, {qy:+.4}, {qz:+.4}]")
}
