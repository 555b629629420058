//! [`RigDevice`] trait and the [`RigDescription`] of a physical rig.

use std::fs;
use std::path::Path;

use rigport_calib::{CalibrationData, CalibrationFileError};
use rigport_types::{SensorBinding, SourceError};
use serde::{Deserialize, Serialize};

/// The hardware side of a sensor source: a device that can be enumerated,
/// connected, and told to stream.
///
/// Implementations only talk to the hardware.  Lifecycle sequencing, graph
/// construction and query answering live in `rigport-core`, which calls
/// these methods while holding its transition lock, so they are never
/// invoked concurrently.
pub trait RigDevice: Send {
    /// Stable device serial, e.g. `"SIM-STEREO-IMU-0001"`.
    fn serial(&self) -> &str;

    /// Every sensor this device provides and the frame it is mounted in.
    /// Must return the same list for the lifetime of the device.
    fn sensors(&self) -> &[SensorBinding];

    /// Perform the connection handshake and return the calibration stored on
    /// the device (factory extrinsics, hardware-synchronised clock offsets).
    /// An empty [`CalibrationData`] is a valid answer.
    ///
    /// # Errors
    ///
    /// [`SourceError::DeviceError`] when the device cannot be reached.
    fn connect(&mut self) -> Result<CalibrationData, SourceError>;

    /// Release the device handle.
    ///
    /// # Errors
    ///
    /// [`SourceError::DeviceError`] when the device reports a fault.
    fn disconnect(&mut self) -> Result<(), SourceError>;

    /// Begin data acquisition.
    ///
    /// # Errors
    ///
    /// [`SourceError::DeviceError`] when acquisition cannot start.
    fn start_streaming(&mut self) -> Result<(), SourceError>;

    /// End data acquisition.
    ///
    /// # Errors
    ///
    /// [`SourceError::DeviceError`] when the device reports a fault.
    fn stop_streaming(&mut self) -> Result<(), SourceError>;
}

/// Static description of a rig: identity, sensor layout and the calibration
/// it ships with.  Stored as TOML:
///
/// ```toml
/// serial = "RIG-0001"
///
/// [[sensors]]
/// sensor = { type = "infrared", index = 0 }
/// frame = { category = "camera", index = 0 }
///
/// [[calibration.time_offsets]]
/// source = { type = "accelerometer", index = 0 }
/// destination = { type = "infrared", index = 0 }
/// offset_ns = 1500
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RigDescription {
    pub serial: String,
    #[serde(default)]
    pub sensors: Vec<SensorBinding>,
    #[serde(default)]
    pub calibration: CalibrationData,
}

impl RigDescription {
    pub fn from_toml_str(raw: &str) -> Result<Self, CalibrationFileError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, CalibrationFileError> {
        let raw = fs::read_to_string(path).map_err(|source| CalibrationFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigport_types::{FrameCategory, ReferenceFrame, SensorId, SensorType};

    const RIG: &str = r#"
serial = "RIG-0001"

[[sensors]]
sensor = { type = "infrared", index = 0 }
frame = { category = "camera", index = 0 }

[[sensors]]
sensor = { type = "accelerometer", index = 0 }
frame = { category = "imu", index = 0 }

[[calibration.time_offsets]]
source = { type = "accelerometer", index = 0 }
destination = { type = "infrared", index = 0 }
offset_ns = 1500
"#;

    #[test]
    fn parses_rig_description() {
        let rig = RigDescription::from_toml_str(RIG).unwrap();
        assert_eq!(rig.serial, "RIG-0001");
        assert_eq!(
            rig.sensors,
            vec![
                SensorBinding::new(
                    SensorId::new(SensorType::Infrared, 0),
                    ReferenceFrame::new(FrameCategory::Camera, 0),
                ),
                SensorBinding::new(
                    SensorId::new(SensorType::Accelerometer, 0),
                    ReferenceFrame::new(FrameCategory::Imu, 0),
                ),
            ]
        );
        assert_eq!(rig.calibration.time_offsets.len(), 1);
        assert!(rig.calibration.transforms.is_empty());
    }

    #[test]
    fn serial_is_required() {
        assert!(RigDescription::from_toml_str("[[sensors]]\n").is_err());
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("rig.toml");
        fs::write(&path, RIG).unwrap();
        assert_eq!(RigDescription::load(&path).unwrap().sensors.len(), 2);
    }
}
