//! [`ReferenceFrameRegistry`] – which frame each sensor is mounted in.

use std::collections::HashMap;

use rigport_types::{ReferenceFrame, SensorId, SourceError};

/// Many-to-one map from sensors to the reference frames they are rigidly
/// mounted in, e.g. an accelerometer and a gyroscope sharing one IMU frame.
#[derive(Debug, Default, Clone)]
pub struct ReferenceFrameRegistry {
    /// Sensors in enumeration order.
    sensors: Vec<SensorId>,
    frames: HashMap<SensorId, ReferenceFrame>,
}

impl ReferenceFrameRegistry {
    /// Build a registry from `(sensor, frame)` bindings in enumeration order.
    ///
    /// # Errors
    ///
    /// [`SourceError::InvalidCalibration`] when a sensor is bound twice; a
    /// sensor belongs to exactly one frame.
    pub fn new(
        bindings: impl IntoIterator<Item = (SensorId, ReferenceFrame)>,
    ) -> Result<Self, SourceError> {
        let mut registry = Self::default();
        for (sensor, frame) in bindings {
            if registry.frames.insert(sensor, frame).is_some() {
                return Err(SourceError::InvalidCalibration(format!(
                    "sensor {sensor} is bound to more than one reference frame"
                )));
            }
            registry.sensors.push(sensor);
        }
        Ok(registry)
    }

    /// Sensors in enumeration order.
    pub fn sensors(&self) -> &[SensorId] {
        &self.sensors
    }

    pub fn contains_sensor(&self, sensor: SensorId) -> bool {
        self.frames.contains_key(&sensor)
    }

    /// # Errors
    ///
    /// [`SourceError::UnknownSensor`] when `sensor` was never bound.
    pub fn sensor_reference_frame(&self, sensor: SensorId) -> Result<ReferenceFrame, SourceError> {
        self.frames
            .get(&sensor)
            .copied()
            .ok_or(SourceError::UnknownSensor(sensor))
    }

    /// Distinct frames referenced by any sensor, in first-use order.
    pub fn frames(&self) -> Vec<ReferenceFrame> {
        let mut seen = Vec::new();
        for sensor in &self.sensors {
            let frame = self.frames[sensor];
            if !seen.contains(&frame) {
                seen.push(frame);
            }
        }
        seen
    }
}
