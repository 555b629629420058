//! `rigport-core` – The sensor-source plugin contract and its rig-backed
//! implementation.
//!
//! # Modules
//!
//! - [`port`] – [`SensorSource`][port::SensorSource]: the trait consumers
//!   program against.
//! - [`lifecycle`] – [`LifecycleStateMachine`][lifecycle::LifecycleStateMachine]:
//!   `Closed → Open → Running` sequencing.
//! - [`session`] – [`Session`][session::Session]: the immutable calibration
//!   snapshot built by `open()`.
//! - [`source`] – [`RigSensorSource`][source::RigSensorSource]: a thread-safe
//!   `SensorSource` over any [`RigDevice`][rigport_hal::RigDevice].
//! - [`config`] – [`SourceConfig`][config::SourceConfig]: validation
//!   tolerances and the handshake budget.
//! - [`context`] – [`SdkContext`][context::SdkContext]: logging and span
//!   export setup/teardown.

pub mod config;
pub mod context;
pub mod lifecycle;
pub mod port;
pub mod session;
pub mod source;

pub use config::SourceConfig;
pub use context::{ContextError, LogFormat, LogSeverity, SdkContext, SdkOptions};
pub use lifecycle::{LifecycleStateMachine, Transition};
pub use port::SensorSource;
pub use session::{Session, SessionInfo};
pub use source::RigSensorSource;
