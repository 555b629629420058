//! [`CalibrationData`] – measured transforms and clock offsets as they are
//! stored on disk or returned by a device handshake.
//!
//! The on-disk format is TOML:
//!
//! ```toml
//! [[transforms]]
//! to = { category = "camera", index = 0 }
//! from = { category = "camera", index = 1 }
//! translation = [0.05, 0.0, 0.0]
//! rotation = [1.0, 0.0, 0.0, 0.0]   # w, x, y, z
//!
//! [[time_offsets]]
//! source = { type = "accelerometer", index = 0 }
//! destination = { type = "infrared", index = 0 }
//! offset_ns = 1500
//! ```
//!
//! Every field of a record is required.  A pair with no record is unknown;
//! nothing here ever stands in an identity transform or a zero offset.

use std::fs;
use std::path::{Path, PathBuf};

use rigport_types::{Nanoseconds, ReferenceFrame, SensorId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::transform::{Quaternion, Transform3D, Vec3};

/// Failure to read or parse a calibration document.
#[derive(Error, Debug)]
pub enum CalibrationFileError {
    #[error("failed to read calibration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse calibration data: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialise calibration data: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Measured transform mapping points in `from` into `to`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    pub to: ReferenceFrame,
    pub from: ReferenceFrame,
    /// Metres.
    pub translation: [f64; 3],
    /// Quaternion as `[w, x, y, z]`.
    pub rotation: [f64; 4],
}

impl TransformRecord {
    pub fn new(to: ReferenceFrame, from: ReferenceFrame, transform: Transform3D) -> Self {
        Self {
            to,
            from,
            translation: transform.translation.to_array(),
            rotation: transform.rotation.to_array(),
        }
    }

    pub fn transform(&self) -> Transform3D {
        Transform3D::new(
            Vec3::from_array(self.translation),
            Quaternion::from_array(self.rotation),
        )
    }
}

/// Measured clock offset: `t_destination = t_source + offset_ns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetRecord {
    pub source: SensorId,
    pub destination: SensorId,
    pub offset_ns: Nanoseconds,
}

/// A set of direct calibration measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<TransformRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub time_offsets: Vec<OffsetRecord>,
}

impl CalibrationData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty() && self.time_offsets.is_empty()
    }

    pub fn with_transform(
        mut self,
        to: ReferenceFrame,
        from: ReferenceFrame,
        transform: Transform3D,
    ) -> Self {
        self.transforms.push(TransformRecord::new(to, from, transform));
        self
    }

    pub fn with_time_offset(
        mut self,
        source: SensorId,
        destination: SensorId,
        offset_ns: Nanoseconds,
    ) -> Self {
        self.time_offsets.push(OffsetRecord {
            source,
            destination,
            offset_ns,
        });
        self
    }

    /// Append every record of `other`.  Duplicated pairs are kept as parallel
    /// measurements and must agree when the graphs are validated.
    pub fn merge(&mut self, other: CalibrationData) {
        self.transforms.extend(other.transforms);
        self.time_offsets.extend(other.time_offsets);
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CalibrationFileError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml_string(&self) -> Result<String, CalibrationFileError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Read and parse a calibration file.
    pub fn load(path: &Path) -> Result<Self, CalibrationFileError> {
        let raw = fs::read_to_string(path).map_err(|source| CalibrationFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let data = Self::from_toml_str(&raw)?;
        debug!(
            path = %path.display(),
            transforms = data.transforms.len(),
            time_offsets = data.time_offsets.len(),
            "calibration file parsed"
        );
        Ok(data)
    }
}
