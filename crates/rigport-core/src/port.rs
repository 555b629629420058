//! [`SensorSource`] – the contract every sensor-source adapter satisfies.
//!
//! Consumers (SLAM, fusion, loggers) program against `dyn SensorSource` and
//! never see the device behind it.  All methods take `&self`: queries may be
//! issued from any number of threads at once, and lifecycle transitions are
//! serialised internally by the implementation.
//!
//! | Method | Valid states |
//! |---|---|
//! | [`serial`](SensorSource::serial), [`list_sensors`](SensorSource::list_sensors) | any |
//! | [`sensor_reference_frame`](SensorSource::sensor_reference_frame), [`static_transform`](SensorSource::static_transform), [`time_offset`](SensorSource::time_offset) | `Open`, `Running` |
//! | [`open`](SensorSource::open) | `Closed` |
//! | [`start`](SensorSource::start), [`close`](SensorSource::close) | `Open` |
//! | [`stop`](SensorSource::stop) | `Running` |
//! | [`is_open`](SensorSource::is_open), [`is_running`](SensorSource::is_running) | any |

use rigport_calib::StaticTransform;
use rigport_types::{Nanoseconds, ReferenceFrame, SensorId, SourceError};

pub trait SensorSource: Send + Sync {
    /// Device serial.  Stable for the lifetime of the source.
    fn serial(&self) -> &str;

    /// Every sensor the source provides, in enumeration order.
    fn list_sensors(&self) -> &[SensorId];

    /// Frame `sensor` is mounted in.
    ///
    /// # Errors
    ///
    /// [`SourceError::UnknownSensor`], [`SourceError::NotOpen`].
    fn sensor_reference_frame(&self, sensor: SensorId) -> Result<ReferenceFrame, SourceError>;

    /// Rigid transform mapping points expressed in `from` into `to`.
    ///
    /// # Errors
    ///
    /// [`SourceError::FrameNotFound`], [`SourceError::NoCalibrationPath`],
    /// [`SourceError::NotOpen`].
    fn static_transform(
        &self,
        to: ReferenceFrame,
        from: ReferenceFrame,
    ) -> Result<StaticTransform, SourceError>;

    /// Offset such that `t_destination = t_source + offset`.
    ///
    /// # Errors
    ///
    /// [`SourceError::SensorNotFound`], [`SourceError::TimeOffsetUnknown`],
    /// [`SourceError::TimeOffsetInconsistent`], [`SourceError::NotOpen`].
    fn time_offset(
        &self,
        source: SensorId,
        destination: SensorId,
    ) -> Result<Nanoseconds, SourceError>;

    /// Connect to the device and build the calibration graphs.
    fn open(&self) -> Result<(), SourceError>;

    /// Release the device.  Fails with [`SourceError::StillRunning`] while
    /// streaming; call [`stop`](Self::stop) first.
    fn close(&self) -> Result<(), SourceError>;

    /// Begin data acquisition.
    fn start(&self) -> Result<(), SourceError>;

    /// End data acquisition.
    fn stop(&self) -> Result<(), SourceError>;

    fn is_open(&self) -> bool;

    fn is_running(&self) -> bool;
}
