//! [`RigSensorSource`] – a [`SensorSource`] backed by any [`RigDevice`].
//!
//! # Locking
//!
//! - A `Mutex` owns the device handle and the [`LifecycleStateMachine`].  Only
//!   transitions take it, so `open`/`close`/`start`/`stop` are serialised and
//!   the device never sees two calls at once.
//! - The calibration [`Session`] built by `open()` is published as an
//!   `Arc<Session>` behind an `RwLock`.  Queries hold the read guard only long
//!   enough to clone the `Arc`, then resolve with no lock held.
//! - `is_open`/`is_running` read an atomic mirror of the state.  The mirror
//!   reads `Open` before a session is published and until after it is
//!   withdrawn, so a query that succeeds was answered while `is_open()` held.
//!
//! # Example
//!
//! ```
//! use rigport_core::{RigSensorSource, SensorSource, SourceConfig};
//! use rigport_hal::SimRig;
//! use rigport_types::{SensorId, SensorType};
//!
//! let source = RigSensorSource::new(SimRig::stereo_imu().build(), SourceConfig::default());
//! source.open().unwrap();
//!
//! let accel = SensorId::new(SensorType::Accelerometer, 0);
//! let ir1 = SensorId::new(SensorType::Infrared, 1);
//! assert_eq!(source.time_offset(accel, ir1), Ok(1_700));
//!
//! source.close().unwrap();
//! ```

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard};
use std::time::{Duration, Instant};

use rigport_calib::{CalibrationData, StaticTransform};
use rigport_hal::RigDevice;
use rigport_types::{
    LifecycleState, Nanoseconds, ReferenceFrame, SensorBinding, SensorId, SourceError,
};
use tracing::{debug, info, info_span, warn};

use crate::config::SourceConfig;
use crate::lifecycle::{AtomicLifecycleState, LifecycleStateMachine, Transition};
use crate::port::SensorSource;
use crate::session::{Session, SessionInfo};

struct Transitions {
    lifecycle: LifecycleStateMachine,
    device: Box<dyn RigDevice>,
}

pub struct RigSensorSource {
    serial: String,
    bindings: Vec<SensorBinding>,
    sensors: Vec<SensorId>,
    config: SourceConfig,
    /// Records merged over the device's own calibration on every `open()`.
    extra_calibration: CalibrationData,
    transitions: Mutex<Transitions>,
    state: AtomicLifecycleState,
    session: RwLock<Option<Arc<Session>>>,
}

impl RigSensorSource {
    /// Wrap `device`.  Its serial and sensor list are read once, here.
    pub fn new(device: impl RigDevice + 'static, config: SourceConfig) -> Self {
        let serial = device.serial().to_string();
        let bindings = device.sensors().to_vec();
        let sensors = bindings.iter().map(|b| b.sensor).collect();
        Self {
            serial,
            bindings,
            sensors,
            config,
            extra_calibration: CalibrationData::new(),
            transitions: Mutex::new(Transitions {
                lifecycle: LifecycleStateMachine::new(),
                device: Box::new(device),
            }),
            state: AtomicLifecycleState::default(),
            session: RwLock::new(None),
        }
    }

    /// Add calibration records (typically loaded from a calibration file) on
    /// top of what the device reports.  Takes effect on the next `open()`.
    pub fn with_calibration(mut self, data: CalibrationData) -> Self {
        self.extra_calibration.merge(data);
        self
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state.load()
    }

    /// `None` while closed.
    pub fn session_info(&self) -> Option<SessionInfo> {
        self.read_session().as_ref().map(|s| s.info())
    }

    /// Every frame in the calibration graph, including frames no sensor is
    /// mounted in.
    ///
    /// # Errors
    ///
    /// [`SourceError::NotOpen`] while closed.
    pub fn frames(&self) -> Result<Vec<ReferenceFrame>, SourceError> {
        Ok(self.snapshot()?.frames().to_vec())
    }

    // ── internals ────────────────────────────────────────────────────────────

    fn lock_transitions(&self) -> MutexGuard<'_, Transitions> {
        self.transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn read_session(&self) -> RwLockReadGuard<'_, Option<Arc<Session>>> {
        self.session.read().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, session: Option<Arc<Session>>) -> Option<Arc<Session>> {
        let mut slot = self.session.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *slot, session)
    }

    fn snapshot(&self) -> Result<Arc<Session>, SourceError> {
        self.read_session().clone().ok_or(SourceError::NotOpen)
    }

    fn timeout(&self, elapsed: Duration) -> SourceError {
        SourceError::DeviceTimeout {
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            budget_ms: self.config.handshake_timeout_ms,
        }
    }
}

fn release_connection(device: &mut dyn RigDevice) {
    if let Err(e) = device.disconnect() {
        warn!(error = %e, "device release failed during rollback");
    }
}

impl SensorSource for RigSensorSource {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn list_sensors(&self) -> &[SensorId] {
        &self.sensors
    }

    fn sensor_reference_frame(&self, sensor: SensorId) -> Result<ReferenceFrame, SourceError> {
        self.snapshot()?
            .sensor_reference_frame(sensor)
            .inspect_err(|e| debug!(%sensor, error = %e, "reference frame lookup failed"))
    }

    fn static_transform(
        &self,
        to: ReferenceFrame,
        from: ReferenceFrame,
    ) -> Result<StaticTransform, SourceError> {
        self.snapshot()?
            .static_transform(to, from)
            .inspect_err(|e| debug!(%to, %from, error = %e, "static transform unavailable"))
    }

    fn time_offset(
        &self,
        source: SensorId,
        destination: SensorId,
    ) -> Result<Nanoseconds, SourceError> {
        self.snapshot()?
            .time_offset(source, destination)
            .inspect_err(|e| debug!(%source, %destination, error = %e, "time offset unavailable"))
    }

    fn open(&self) -> Result<(), SourceError> {
        let span = info_span!("open", serial = %self.serial);
        let _enter = span.enter();

        let mut guard = self.lock_transitions();
        let transitions = &mut *guard;
        transitions.lifecycle.check(Transition::Open)?;

        let started = Instant::now();
        let mut data = transitions.device.connect()?;
        let elapsed = started.elapsed();
        if elapsed > self.config.handshake_timeout() {
            release_connection(transitions.device.as_mut());
            let err = self.timeout(elapsed);
            warn!(error = %err, "device handshake exceeded its budget");
            return Err(err);
        }

        data.merge(self.extra_calibration.clone());
        let session = match Session::build(&self.bindings, &data, &self.config) {
            Ok(session) => Arc::new(session),
            Err(e) => {
                release_connection(transitions.device.as_mut());
                warn!(error = %e, "calibration rejected");
                return Err(e);
            }
        };

        let summary = session.info();
        transitions.lifecycle.commit(Transition::Open)?;
        self.state.store(LifecycleState::Open);
        self.publish(Some(session));
        info!(
            session = %summary.id,
            frames = summary.frames,
            transforms = summary.transforms,
            time_offsets = summary.time_offsets,
            "sensor source opened"
        );
        Ok(())
    }

    fn close(&self) -> Result<(), SourceError> {
        let span = info_span!("close", serial = %self.serial);
        let _enter = span.enter();

        let mut guard = self.lock_transitions();
        guard.lifecycle.check(Transition::Close)?;
        guard.device.disconnect()?;
        guard.lifecycle.commit(Transition::Close)?;
        let previous = self.publish(None);
        self.state.store(LifecycleState::Closed);

        match previous {
            Some(session) => info!(session = %session.id(), "sensor source closed"),
            None => info!("sensor source closed"),
        }
        Ok(())
    }

    fn start(&self) -> Result<(), SourceError> {
        let span = info_span!("start", serial = %self.serial);
        let _enter = span.enter();

        let mut guard = self.lock_transitions();
        guard.lifecycle.check(Transition::Start)?;

        let started = Instant::now();
        guard.device.start_streaming()?;
        let elapsed = started.elapsed();
        if elapsed > self.config.handshake_timeout() {
            if let Err(e) = guard.device.stop_streaming() {
                warn!(error = %e, "device release failed during rollback");
            }
            let err = self.timeout(elapsed);
            warn!(error = %err, "stream start exceeded its budget");
            return Err(err);
        }

        guard.lifecycle.commit(Transition::Start)?;
        self.state.store(LifecycleState::Running);
        info!("sensor source running");
        Ok(())
    }

    fn stop(&self) -> Result<(), SourceError> {
        let span = info_span!("stop", serial = %self.serial);
        let _enter = span.enter();

        let mut guard = self.lock_transitions();
        guard.lifecycle.check(Transition::Stop)?;
        guard.device.stop_streaming()?;
        guard.lifecycle.commit(Transition::Stop)?;
        self.state.store(LifecycleState::Open);
        info!("sensor source stopped");
        Ok(())
    }

    fn is_open(&self) -> bool {
        matches!(
            self.state.load(),
            LifecycleState::Open | LifecycleState::Running
        )
    }

    fn is_running(&self) -> bool {
        self.state.load() == LifecycleState::Running
    }
}
