//! In-process simulated rigs for tests and demos without physical hardware.
//!
//! [`SimRig`] is a builder producing a [`SimDevice`]: a [`RigDevice`] that
//! records lifecycle calls, returns the calibration it was built with, and can
//! be told to stall or fail its handshake.  A [`SimProbe`] obtained before the
//! device is handed off lets tests observe it afterwards.
//!
//! # Stub behaviour
//!
//! | Call | Behaviour |
//! |---|---|
//! | `connect` | Sleeps for the handshake delay, then returns the configured calibration. Fails if told to, or if already connected. |
//! | `disconnect` | Clears the connected flag; fails if not connected. |
//! | `start_streaming` | Sleeps for the start delay; fails unless connected and idle. |
//! | `stop_streaming` | Fails unless streaming. |
//!
//! # Example
//!
//! ```rust
//! use rigport_hal::sim::SimRig;
//! use rigport_hal::RigDevice;
//!
//! let mut device = SimRig::stereo_imu().build();
//! let probe = device.probe();
//!
//! let calibration = device.connect().unwrap();
//! assert_eq!(calibration.transforms.len(), 1);
//! assert!(probe.is_connected());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use rigport_calib::{CalibrationData, Quaternion, Transform3D, Vec3};
use rigport_types::{
    FrameCategory, Nanoseconds, ReferenceFrame, SensorBinding, SensorId, SensorType, SourceError,
};
use tracing::debug;

use crate::device::{RigDescription, RigDevice};

// ─────────────────────────────────────────────────────────────────────────────
// Probe
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SimState {
    connected: AtomicBool,
    streaming: AtomicBool,
    connects: AtomicUsize,
}

/// Read-only view of a [`SimDevice`]'s state that stays valid after the
/// device has been moved into a sensor source.
#[derive(Debug, Clone)]
pub struct SimProbe(Arc<SimState>);

impl SimProbe {
    pub fn is_connected(&self) -> bool {
        self.0.connected.load(Ordering::SeqCst)
    }

    pub fn is_streaming(&self) -> bool {
        self.0.streaming.load(Ordering::SeqCst)
    }

    /// Number of successful handshakes so far.
    pub fn connect_count(&self) -> usize {
        self.0.connects.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SimDevice
// ─────────────────────────────────────────────────────────────────────────────

/// A simulated rig.  Construct with [`SimRig`] or
/// [`SimDevice::from_description`].
#[derive(Debug)]
pub struct SimDevice {
    description: RigDescription,
    handshake_delay: Duration,
    start_delay: Duration,
    connect_failure: Option<String>,
    state: Arc<SimState>,
}

impl SimDevice {
    /// A simulated device that reports exactly what `description` declares.
    pub fn from_description(description: RigDescription) -> Self {
        Self {
            description,
            handshake_delay: Duration::ZERO,
            start_delay: Duration::ZERO,
            connect_failure: None,
            state: Arc::default(),
        }
    }

    pub fn probe(&self) -> SimProbe {
        SimProbe(self.state.clone())
    }

    pub fn description(&self) -> &RigDescription {
        &self.description
    }

    fn fault(&self, details: impl Into<String>) -> SourceError {
        SourceError::DeviceError(format!("{}: {}", self.description.serial, details.into()))
    }
}

impl RigDevice for SimDevice {
    fn serial(&self) -> &str {
        &self.description.serial
    }

    fn sensors(&self) -> &[SensorBinding] {
        &self.description.sensors
    }

    fn connect(&mut self) -> Result<CalibrationData, SourceError> {
        if let Some(reason) = &self.connect_failure {
            return Err(self.fault(reason.clone()));
        }
        if self.state.connected.load(Ordering::SeqCst) {
            return Err(self.fault("already connected"));
        }
        if !self.handshake_delay.is_zero() {
            std::thread::sleep(self.handshake_delay);
        }
        self.state.connected.store(true, Ordering::SeqCst);
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        debug!(serial = %self.description.serial, "sim device connected");
        Ok(self.description.calibration.clone())
    }

    fn disconnect(&mut self) -> Result<(), SourceError> {
        if !self.state.connected.swap(false, Ordering::SeqCst) {
            return Err(self.fault("not connected"));
        }
        self.state.streaming.store(false, Ordering::SeqCst);
        debug!(serial = %self.description.serial, "sim device disconnected");
        Ok(())
    }

    fn start_streaming(&mut self) -> Result<(), SourceError> {
        if !self.state.connected.load(Ordering::SeqCst) {
            return Err(self.fault("cannot stream while disconnected"));
        }
        if self.state.streaming.load(Ordering::SeqCst) {
            return Err(self.fault("already streaming"));
        }
        if !self.start_delay.is_zero() {
            std::thread::sleep(self.start_delay);
        }
        self.state.streaming.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_streaming(&mut self) -> Result<(), SourceError> {
        if !self.state.streaming.swap(false, Ordering::SeqCst) {
            return Err(self.fault("not streaming"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SimRig builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`SimDevice`].
#[derive(Debug, Default)]
pub struct SimRig {
    description: RigDescription,
    handshake_delay: Duration,
    start_delay: Duration,
    connect_failure: Option<String>,
}

impl SimRig {
    /// An empty rig with serial `"SIM-0000"`.
    pub fn builder() -> Self {
        Self::default().serial("SIM-0000")
    }

    /// Stereo infrared pair plus a 6-axis IMU.
    ///
    /// | Sensor | Frame |
    /// |---|---|
    /// | `Infrared:0` | `Camera:0` |
    /// | `Infrared:1` | `Camera:1` |
    /// | `Accelerometer:0` | `IMU:0` |
    /// | `Gyroscope:0` | `IMU:0` |
    ///
    /// Ships with the stereo extrinsics (5 cm baseline) and two clock offsets,
    /// `Accelerometer:0 → Infrared:0 = 1500 ns` and
    /// `Infrared:0 → Infrared:1 = 200 ns`.  No IMU-to-camera extrinsics are
    /// included.
    pub fn stereo_imu() -> Self {
        let ir0 = SensorId::new(SensorType::Infrared, 0);
        let ir1 = SensorId::new(SensorType::Infrared, 1);
        let accel = SensorId::new(SensorType::Accelerometer, 0);
        let gyro = SensorId::new(SensorType::Gyroscope, 0);
        let cam0 = ReferenceFrame::new(FrameCategory::Camera, 0);
        let cam1 = ReferenceFrame::new(FrameCategory::Camera, 1);
        let imu = ReferenceFrame::new(FrameCategory::Imu, 0);

        Self::builder()
            .serial("SIM-STEREO-IMU-0001")
            .with_sensor(ir0, cam0)
            .with_sensor(ir1, cam1)
            .with_sensor(accel, imu)
            .with_sensor(gyro, imu)
            .with_transform(
                cam0,
                cam1,
                Transform3D::new(Vec3::new(0.05, 0.0, 0.0), Quaternion::identity()),
            )
            .with_time_offset(accel, ir0, 1500)
            .with_time_offset(ir0, ir1, 200)
    }

    /// A wheel-odometry source: one odometry sensor, plus the transform from
    /// its frame to the vehicle base.
    pub fn wheel_odometry() -> Self {
        let odom = ReferenceFrame::new(FrameCategory::Odometry, 0);
        let base = ReferenceFrame::new(FrameCategory::Base, 0);
        Self::builder()
            .serial("SIM-ODOM-0001")
            .with_sensor(SensorId::new(SensorType::Odometry, 0), odom)
            .with_transform(
                base,
                odom,
                Transform3D::new(Vec3::new(0.0, 0.0, 0.1), Quaternion::identity()),
            )
    }

    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.description.serial = serial.into();
        self
    }

    pub fn with_sensor(mut self, sensor: SensorId, frame: ReferenceFrame) -> Self {
        self.description
            .sensors
            .push(SensorBinding::new(sensor, frame));
        self
    }

    /// Factory transform mapping points in `from` into `to`.
    pub fn with_transform(
        mut self,
        to: ReferenceFrame,
        from: ReferenceFrame,
        transform: Transform3D,
    ) -> Self {
        self.description.calibration = self
            .description
            .calibration
            .with_transform(to, from, transform);
        self
    }

    /// Hardware clock offset, `t_destination = t_source + offset_ns`.
    pub fn with_time_offset(
        mut self,
        source: SensorId,
        destination: SensorId,
        offset_ns: Nanoseconds,
    ) -> Self {
        self.description.calibration = self
            .description
            .calibration
            .with_time_offset(source, destination, offset_ns);
        self
    }

    /// Make `connect` stall for `delay` before succeeding.
    pub fn with_handshake_delay(mut self, delay: Duration) -> Self {
        self.handshake_delay = delay;
        self
    }

    /// Make `start_streaming` stall for `delay` before succeeding.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Make every `connect` fail with [`SourceError::DeviceError`].
    pub fn failing_connect(mut self, reason: impl Into<String>) -> Self {
        self.connect_failure = Some(reason.into());
        self
    }

    pub fn build(self) -> SimDevice {
        SimDevice {
            handshake_delay: self.handshake_delay,
            start_delay: self.start_delay,
            connect_failure: self.connect_failure,
            ..SimDevice::from_description(self.description)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
