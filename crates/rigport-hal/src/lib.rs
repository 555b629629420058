//! `rigport-hal` – Hardware side of a sensor source.
//!
//! # Modules
//!
//! - [`device`] – [`RigDevice`][device::RigDevice]: what an adapter must do to
//!   talk to its hardware (enumerate, connect, stream), and
//!   [`RigDescription`][device::RigDescription], the static layout of a rig.
//! - [`sim`] – [`SimRig`][sim::SimRig] / [`SimDevice`][sim::SimDevice]:
//!   in-process simulated rigs for tests and demos.

pub mod device;
pub mod sim;

pub use device::{RigDescription, RigDevice};
pub use sim::{SimDevice, SimProbe, SimRig};
