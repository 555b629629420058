//! [`Session`] – the immutable query snapshot built by `open()`.
//!
//! A session owns the frame registry and both calibration graphs.  It is
//! built once per successful `open()`, published behind an `Arc`, and never
//! mutated afterwards, so any number of readers can resolve against it
//! without locking.

use chrono::{DateTime, Utc};
use rigport_calib::{
    CalibrationData, CalibrationGraph, ReferenceFrameRegistry, StaticTransform, TimeSyncGraph,
};
use rigport_types::{Nanoseconds, ReferenceFrame, SensorBinding, SensorId, SourceError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SourceConfig;

/// Summary of an open session, for logs and status output.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub id: Uuid,
    pub opened_at: DateTime<Utc>,
    pub frames: usize,
    pub transforms: usize,
    pub time_offsets: usize,
    /// Sensors with an offset inside a block whose clock cycles disagree.
    pub inconsistent_sensors: Vec<SensorId>,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    opened_at: DateTime<Utc>,
    registry: ReferenceFrameRegistry,
    calibration: CalibrationGraph,
    time_sync: TimeSyncGraph,
}

impl Session {
    /// Build the registry and both graphs from the device's sensor list and
    /// the merged calibration records.
    ///
    /// Every frame a sensor is mounted in becomes a calibration node; frames
    /// that appear only in transform records (a vehicle base, say) are added
    /// as well.  Time offsets may only name listed sensors.
    ///
    /// Clock cycles that disagree beyond tolerance do not fail the build:
    /// their sensors are marked and queries through them fail individually.
    ///
    /// # Errors
    ///
    /// - [`SourceError::InvalidCalibration`] – duplicate sensor binding,
    ///   malformed record, or an offset naming an unlisted sensor.
    /// - [`SourceError::InconsistentCalibration`] – a transform cycle does not
    ///   compose to the identity within tolerance.
    pub fn build(
        bindings: &[SensorBinding],
        data: &CalibrationData,
        config: &SourceConfig,
    ) -> Result<Self, SourceError> {
        let registry = ReferenceFrameRegistry::new(bindings.iter().map(|b| (b.sensor, b.frame)))?;

        let mut calibration = CalibrationGraph::new();
        for frame in registry.frames() {
            calibration.add_frame(frame);
        }
        for record in &data.transforms {
            calibration.add_direct_transform(record.to, record.from, record.transform())?;
        }
        calibration.validate(config.rotation_tolerance, config.translation_tolerance)?;

        let mut time_sync = TimeSyncGraph::new();
        for &sensor in registry.sensors() {
            time_sync.add_sensor(sensor);
        }
        for record in &data.time_offsets {
            for sensor in [record.source, record.destination] {
                if !registry.contains_sensor(sensor) {
                    return Err(SourceError::InvalidCalibration(format!(
                        "time offset names {sensor}, which the device does not list"
                    )));
                }
            }
            time_sync.add_direct_offset(record.source, record.destination, record.offset_ns)?;
        }
        for cycle in time_sync.finalize(config.time_offset_tolerance_ns) {
            let sensors: Vec<String> = cycle.sensors.iter().map(ToString::to_string).collect();
            warn!(
                residual_ns = %cycle.residual_ns,
                sensors = %sensors.join(", "),
                "inconsistent clock-offset cycle; offsets through it are unavailable"
            );
        }

        let session = Self {
            id: Uuid::new_v4(),
            opened_at: Utc::now(),
            registry,
            calibration,
            time_sync,
        };
        debug!(
            session = %session.id,
            frames = session.calibration.frames().len(),
            transforms = session.calibration.edge_count(),
            time_offsets = session.time_sync.measured_count(),
            "calibration session built"
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Every calibration node, in insertion order: sensor frames first, then
    /// frames introduced by transform records.
    pub fn frames(&self) -> &[ReferenceFrame] {
        self.calibration.frames()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            opened_at: self.opened_at,
            frames: self.calibration.frames().len(),
            transforms: self.calibration.edge_count(),
            time_offsets: self.time_sync.measured_count(),
            inconsistent_sensors: self
                .registry
                .sensors()
                .iter()
                .copied()
                .filter(|&s| self.time_sync.is_inconsistent(s))
                .collect(),
        }
    }

    pub fn sensor_reference_frame(&self, sensor: SensorId) -> Result<ReferenceFrame, SourceError> {
        self.registry.sensor_reference_frame(sensor)
    }

    pub fn static_transform(
        &self,
        to: ReferenceFrame,
        from: ReferenceFrame,
    ) -> Result<StaticTransform, SourceError> {
        self.calibration.static_transform(to, from)
    }

    pub fn time_offset(
        &self,
        source: SensorId,
        destination: SensorId,
    ) -> Result<Nanoseconds, SourceError> {
        self.time_sync.time_offset(source, destination)
    }
}
