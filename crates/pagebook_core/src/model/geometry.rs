//! Geometry value types shared by records and the scene tree.
//!
//! All components are `f32` to match the host renderer. Equality used by
//! change detection is bitwise (`bitwise_eq`), never tolerance based.

use serde::{Deserialize, Serialize};

/// Three-component vector used for position and scale.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits()
            && self.y.to_bits() == other.y.to_bits()
            && self.z.to_bits() == other.z.to_bits()
    }
}

/// Rotation quaternion stored as `(x, y, z, w)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Builds a rotation from Euler angles in degrees.
    ///
    /// Rotation order is Z, then X, then Y, which is the order used by the
    /// legacy preference layout that stored tab rotations as Euler triples.
    pub fn from_euler_degrees(x: f32, y: f32, z: f32) -> Self {
        let axis = |degrees: f32| {
            let half = degrees.to_radians() * 0.5;
            (half.sin(), half.cos())
        };
        let (sx, cx) = axis(x);
        let (sy, cy) = axis(y);
        let (sz, cz) = axis(z);

        let qx = Self::new(sx, 0.0, 0.0, cx);
        let qy = Self::new(0.0, sy, 0.0, cy);
        let qz = Self::new(0.0, 0.0, sz, cz);
        qy.mul(&qx).mul(&qz)
    }

    /// Hamilton product `self * rhs`.
    pub fn mul(&self, rhs: &Self) -> Self {
        Self {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }

    /// Returns the rotation about the Y axis in degrees, normalized to `[0, 360)`.
    pub fn yaw_degrees(&self) -> f32 {
        let sin_term = 2.0 * (self.x * self.z + self.w * self.y);
        let cos_term = 1.0 - 2.0 * (self.x * self.x + self.y * self.y);
        let degrees = sin_term.atan2(cos_term).to_degrees();
        let normalized = degrees.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
        if normalized >= 360.0 {
            0.0
        } else {
            normalized
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }

    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits()
            && self.y.to_bits() == other.y.to_bits()
            && self.z.to_bits() == other.z.to_bits()
            && self.w.to_bits() == other.w.to_bits()
    }
}

/// Local-space transform relative to the owning container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Identity rotation and unit scale at `position`.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }

    /// Exact comparison used by change detection; `NaN` payloads compare by bits.
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.position.bitwise_eq(&other.position)
            && self.rotation.bitwise_eq(&other.rotation)
            && self.scale.bitwise_eq(&other.scale)
    }
}

/// Axis-aligned 2D rectangle in a container's local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Rect {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: max_x.max(min_x),
            max_y: max_y.max(min_y),
        }
    }

    /// Rectangle of `size` centered on `(x, y)`.
    pub fn centered(x: f32, y: f32, size: f32) -> Self {
        let half = size * 0.5;
        Self::new(x - half, y - half, x + half, y + half)
    }

    /// Inclusive containment test.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x.clamp(self.min_x, self.max_x),
            y.clamp(self.min_y, self.max_y),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Quat, Rect, Transform, Vec3};

    #[test]
    fn euler_yaw_roundtrips_for_front_and_back_faces() {
        assert!(Quat::from_euler_degrees(0.0, 0.0, 0.0).yaw_degrees().abs() < 1e-3);
        let back = Quat::from_euler_degrees(0.0, 180.0, 0.0).yaw_degrees();
        assert!((back - 180.0).abs() < 1e-3, "got {back}");
        let quarter = Quat::from_euler_degrees(0.0, 90.0, 0.0).yaw_degrees();
        assert!((quarter - 90.0).abs() < 1e-3, "got {quarter}");
    }

    #[test]
    fn bitwise_eq_distinguishes_signed_zero() {
        let a = Transform::at(Vec3::new(0.0, 1.0, 2.0));
        let b = Transform::at(Vec3::new(-0.0, 1.0, 2.0));
        assert!(a.bitwise_eq(&a));
        assert!(!a.bitwise_eq(&b));
    }

    #[test]
    fn rect_normalizes_and_clamps() {
        let rect = Rect::new(10.0, 10.0, -10.0, -10.0);
        assert_eq!(rect.min_x, -10.0);
        assert_eq!(rect.clamp(50.0, -50.0), (10.0, -10.0));
        assert!(Rect::centered(0.0, 0.0, 4.0).contains(2.0, -2.0));
        assert!(!Rect::centered(0.0, 0.0, 4.0).contains(2.1, 0.0));
    }
}
