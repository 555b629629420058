//! Rigid-body transform math.
//!
//! A [`Transform3D`] `T_a_b` maps points expressed in frame `b` into frame
//! `a`: rotate by `rotation`, then add `translation`.  Composition follows the
//! subscript chain, `T_a_b.compose(T_b_c) == T_a_c`.
//!
//! # Example
//!
//! ```rust
//! use rigport_calib::transform::{Quaternion, Transform3D, Vec3};
//!
//! let base_to_cam = Transform3D::new(Vec3::new(0.5, 0.0, 0.0), Quaternion::identity());
//! let cam_to_base = base_to_cam.inverse();
//!
//! let round_trip = base_to_cam.compose(cam_to_base);
//! assert!(round_trip.approx_eq(&Transform3D::identity(), 1e-9, 1e-9));
//! ```

use rigport_types::ReferenceFrame;

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D translation vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn from_array(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }

    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    /// Create a quaternion.  Use [`Quaternion::try_normalized`] when the input
    /// comes from an external source.
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle_rad` around the unit `axis`.
    pub fn from_axis_angle(axis: Vec3, angle_rad: f64) -> Self {
        let half = angle_rad * 0.5;
        let s = half.sin();
        Self::new(half.cos(), axis.x * s, axis.y * s, axis.z * s)
    }

    pub fn from_array(q: [f64; 4]) -> Self {
        Self::new(q[0], q[1], q[2], q[3])
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.w, self.x, self.y, self.z]
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn norm(self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Scale to unit length, or `None` for a zero or non-finite quaternion.
    pub fn try_normalized(self) -> Option<Self> {
        let n = self.norm();
        if !n.is_finite() || n < f64::EPSILON {
            return None;
        }
        Some(Self::new(self.w / n, self.x / n, self.y / n, self.z / n))
    }

    /// Scale to unit length.  Falls back to the input unchanged when it cannot
    /// be normalised; only call this on quaternions built from validated data.
    pub fn normalized(self) -> Self {
        self.try_normalized().unwrap_or(self)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    /// Angle in radians of the rotation taking `self` to `other`.
    ///
    /// Uses `atan2` rather than `acos` so that sub-microradian differences
    /// stay resolvable.  `q` and `-q` are treated as the same rotation.
    pub fn angle_to(self, other: Self) -> f64 {
        let d = self.conjugate().mul(other);
        let vec_norm = (d.x * d.x + d.y * d.y + d.z * d.z).sqrt();
        2.0 * vec_norm.atan2(d.w.abs())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform: rotation followed by translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Compose two transforms: `T_a_b.compose(T_b_c) == T_a_c`.
    ///
    /// The rotation is renormalised after every product so that drift does
    /// not accumulate along long chains.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation).normalized();
        Self::new(translated, rotated)
    }

    /// `T_a_b.inverse() == T_b_a`.
    pub fn inverse(self) -> Self {
        let rotation = self.rotation.conjugate();
        let translation = rotation.rotate(self.translation).neg();
        Self::new(translation, rotation)
    }

    /// Map a point expressed in the source frame into the target frame.
    pub fn apply_point(self, p: Vec3) -> Vec3 {
        self.rotation.rotate(p).add(self.translation)
    }

    /// Rotation angle (rad) and translation distance separating two
    /// transforms.
    pub fn residual(&self, other: &Self) -> (f64, f64) {
        (
            self.rotation.angle_to(other.rotation),
            self.translation.sub(other.translation).norm(),
        )
    }

    /// `true` when both residuals are within the given tolerances.
    pub fn approx_eq(&self, other: &Self, rotation_tol: f64, translation_tol: f64) -> bool {
        let (rot, trans) = self.residual(other);
        rot <= rotation_tol && trans <= translation_tol
    }
}

// ────────────────────────────────────────────────────────────────────────────
// StaticTransform
// ────────────────────────────────────────────────────────────────────────────

/// A fixed transform between two reference frames, mapping points expressed
/// in `from` into `to`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticTransform {
    pub to: ReferenceFrame,
    pub from: ReferenceFrame,
    pub transform: Transform3D,
}

impl StaticTransform {
    pub fn new(to: ReferenceFrame, from: ReferenceFrame, transform: Transform3D) -> Self {
        Self {
            to,
            from,
            transform,
        }
    }

    /// The identity transform of a frame onto itself.
    pub fn identity(frame: ReferenceFrame) -> Self {
        Self::new(frame, frame, Transform3D::identity())
    }

    /// The same relation expressed in the opposite direction.
    pub fn inverse(&self) -> Self {
        Self::new(self.from, self.to, self.transform.inverse())
    }

    /// Chain `self` (`to ← from`) with `next` (`from ← next.from`).
    ///
    /// Returns `None` when the frames do not line up.
    pub fn then(&self, next: &StaticTransform) -> Option<Self> {
        if self.from != next.to {
            return None;
        }
        Some(Self::new(
            self.to,
            next.from,
            self.transform.compose(next.transform),
        ))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
