//! `rigport-types` – identifiers, lifecycle states and the error taxonomy
//! shared by every layer of the sensor-source contract.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Signed clock offset in nanoseconds.
pub type Nanoseconds = i64;

/// Kind of physical sensor channel exposed by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    Infrared,
    Color,
    Depth,
    Accelerometer,
    Gyroscope,
    Odometry,
    Magnetometer,
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorType::Infrared => "Infrared",
            SensorType::Color => "Color",
            SensorType::Depth => "Depth",
            SensorType::Accelerometer => "Accelerometer",
            SensorType::Gyroscope => "Gyroscope",
            SensorType::Odometry => "Odometry",
            SensorType::Magnetometer => "Magnetometer",
        };
        f.write_str(name)
    }
}

/// Identifier of a sensor channel: its type plus an index among sensors of
/// that type, e.g. `Infrared:1` for the right camera of a stereo pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SensorId {
    #[serde(rename = "type")]
    pub sensor_type: SensorType,
    pub index: u32,
}

impl SensorId {
    pub const fn new(sensor_type: SensorType, index: u32) -> Self {
        Self { sensor_type, index }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sensor_type, self.index)
    }
}

/// Category of a rigid coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameCategory {
    Camera,
    Imu,
    Odometry,
    /// Vehicle body frame, typically the wheel-odometry origin.
    Base,
}

impl fmt::Display for FrameCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameCategory::Camera => "Camera",
            FrameCategory::Imu => "IMU",
            FrameCategory::Odometry => "Odometry",
            FrameCategory::Base => "Base",
        };
        f.write_str(name)
    }
}

/// A named rigid coordinate frame that one or more sensors are mounted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceFrame {
    pub category: FrameCategory,
    pub index: u32,
}

impl ReferenceFrame {
    pub const fn new(category: FrameCategory, index: u32) -> Self {
        Self { category, index }
    }
}

impl fmt::Display for ReferenceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.index)
    }
}

/// A sensor together with the reference frame it is mounted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorBinding {
    pub sensor: SensorId,
    pub frame: ReferenceFrame,
}

impl SensorBinding {
    pub const fn new(sensor: SensorId, frame: ReferenceFrame) -> Self {
        Self { sensor, frame }
    }
}

/// Lifecycle state of a sensor source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    #[default]
    Closed,
    Open,
    Running,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Closed => "Closed",
            LifecycleState::Open => "Open",
            LifecycleState::Running => "Running",
        };
        f.write_str(name)
    }
}

/// Every failure a sensor source can report across the plugin boundary.
///
/// Query failures never fall back to an identity transform or a zero offset;
/// a caller that receives one of these must treat the answer as unknown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("unknown sensor {0}")]
    UnknownSensor(SensorId),

    #[error("reference frame {0} is not part of the calibration graph")]
    FrameNotFound(ReferenceFrame),

    #[error("no calibration path from {from} to {to}")]
    NoCalibrationPath {
        to: ReferenceFrame,
        from: ReferenceFrame,
    },

    #[error("sensor {0} is not part of the time synchronisation graph")]
    SensorNotFound(SensorId),

    #[error("time offset from {source_sensor} to {destination_sensor} is unknown")]
    TimeOffsetUnknown {
        source_sensor: SensorId,
        destination_sensor: SensorId,
    },

    #[error(
        "time offset from {source_sensor} to {destination_sensor} crosses an inconsistent clock cycle"
    )]
    TimeOffsetInconsistent {
        source_sensor: SensorId,
        destination_sensor: SensorId,
    },

    #[error("sensor source is not open")]
    NotOpen,

    #[error("sensor source is already open")]
    AlreadyOpen,

    #[error("sensor source is already running")]
    AlreadyRunning,

    #[error("sensor source is not running")]
    NotRunning,

    #[error("sensor source is still running; stop it before closing")]
    StillRunning,

    #[error("device error: {0}")]
    DeviceError(String),

    #[error("device handshake took {elapsed_ms} ms, budget is {budget_ms} ms")]
    DeviceTimeout { elapsed_ms: u64, budget_ms: u64 },

    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("inconsistent calibration cycle through {from} -> {to}: {details}")]
    InconsistentCalibration {
        to: ReferenceFrame,
        from: ReferenceFrame,
        details: String,
    },
}

impl SourceError {
    /// Short, stable name of the error kind, used in tables and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::UnknownSensor(_) => "UnknownSensor",
            SourceError::FrameNotFound(_) => "FrameNotFound",
            SourceError::NoCalibrationPath { .. } => "NoCalibrationPath",
            SourceError::SensorNotFound(_) => "SensorNotFound",
            SourceError::TimeOffsetUnknown { .. } => "TimeOffsetUnknown",
            SourceError::TimeOffsetInconsistent { .. } => "TimeOffsetInconsistent",
            SourceError::NotOpen => "NotOpen",
            SourceError::AlreadyOpen => "AlreadyOpen",
            SourceError::AlreadyRunning => "AlreadyRunning",
            SourceError::NotRunning => "NotRunning",
            SourceError::StillRunning => "StillRunning",
            SourceError::DeviceError(_) => "DeviceError",
            SourceError::DeviceTimeout { .. } => "DeviceTimeout",
            SourceError::InvalidCalibration(_) => "InvalidCalibration",
            SourceError::InconsistentCalibration { .. } => "InconsistentCalibration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_id_serialises_with_type_key() {
        let id = SensorId::new(SensorType::Accelerometer, 0);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"type":"accelerometer","index":0}"#);
    }

    #[test]
    fn reference_frame_parses_from_toml_inline_table() {
        #[derive(Deserialize)]
        struct Wrapper {
            frame: ReferenceFrame,
        }
        let w: Wrapper = toml::from_str(r#"frame = { category = "imu", index = 2 }"#).unwrap();
        assert_eq!(w.frame, ReferenceFrame::new(FrameCategory::Imu, 2));
    }

    #[test]
    fn display_formats_are_compact() {
        assert_eq!(SensorId::new(SensorType::Infrared, 1).to_string(), "Infrared:1");
        assert_eq!(ReferenceFrame::new(FrameCategory::Imu, 0).to_string(), "IMU:0");
        assert_eq!(LifecycleState::Running.to_string(), "Running");
    }

    #[test]
    fn lifecycle_defaults_to_closed() {
        assert_eq!(LifecycleState::default(), LifecycleState::Closed);
    }

    #[test]
    fn source_error_display_and_kind() {
        let err = SourceError::NoCalibrationPath {
            to: ReferenceFrame::new(FrameCategory::Imu, 0),
            from: ReferenceFrame::new(FrameCategory::Camera, 1),
        };
        assert_eq!(err.kind(), "NoCalibrationPath");
        assert!(err.to_string().contains("Camera:1 to IMU:0"));

        let err = SourceError::DeviceTimeout {
            elapsed_ms: 12,
            budget_ms: 10,
        };
        assert_eq!(err.kind(), "DeviceTimeout");
        assert!(err.to_string().contains("12 ms"));
    }
}
