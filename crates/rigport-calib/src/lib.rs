//! `rigport-calib` – Spatial and temporal calibration of a sensor rig.
//!
//! Turns a handful of directly measured relations (stereo extrinsics, an
//! IMU-to-camera offset, clock offsets from a sync cable) into answers for
//! every sensor pair the measurements connect.
//!
//! # Modules
//!
//! - [`transform`] – [`Transform3D`][transform::Transform3D] and
//!   [`StaticTransform`][transform::StaticTransform]: rigid-body math.
//! - [`registry`] – [`ReferenceFrameRegistry`][registry::ReferenceFrameRegistry]:
//!   which frame each sensor is mounted in.
//! - [`calibration_graph`] – [`CalibrationGraph`][calibration_graph::CalibrationGraph]:
//!   undirected graph resolving transforms between any two connected frames.
//! - [`time_sync`] – [`TimeSyncGraph`][time_sync::TimeSyncGraph]: directed
//!   graph resolving clock offsets between any two connected sensors.
//! - [`calibration_data`] – [`CalibrationData`][calibration_data::CalibrationData]:
//!   the measurement records fed into both graphs, with a TOML loader.

pub mod calibration_data;
pub mod calibration_graph;
pub mod registry;
pub mod time_sync;
pub mod transform;

pub use calibration_data::{CalibrationData, CalibrationFileError, OffsetRecord, TransformRecord};
pub use calibration_graph::CalibrationGraph;
pub use registry::ReferenceFrameRegistry;
pub use time_sync::{ClockCycleResidual, TimeSyncGraph};
pub use transform::{Quaternion, StaticTransform, Transform3D, Vec3};
