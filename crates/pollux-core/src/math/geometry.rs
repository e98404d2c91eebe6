// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Geometric primitives for visibility culling.
//!
//! The lighting passes only need a conservative answer to "can this light
//! contribute to what the camera sees?", so this module keeps to axis-aligned
//! boxes tested against a six-plane view frustum.

use super::{Vec3, EPSILON};

/// Represents an Axis-Aligned Bounding Box (AABB).
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Aabb {
    /// The corner of the box with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner of the box with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// An invalid `Aabb` where `min` components are positive infinity and `max` are negative infinity.
    ///
    /// Merging any valid `Aabb` with `INVALID` results in that valid `Aabb`.
    pub const INVALID: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Creates a new `Aabb` from two corner points, in any order.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates a new `Aabb` from a center point and its half-extents.
    ///
    /// Negative half-extents are made positive.
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let h = half_extents.abs();
        Self {
            min: center - h,
            max: center + h,
        }
    }

    /// Creates an `Aabb` that tightly encloses a given set of points.
    ///
    /// Returns `None` if `points` is empty.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        Some(rest.iter().fold(
            Self {
                min: *first,
                max: *first,
            },
            |acc, p| Self {
                min: acc.min.min(*p),
                max: acc.max.max(*p),
            },
        ))
    }

    /// Calculates the center point of the `Aabb`.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Checks if the `Aabb` is valid (i.e., `min` is less than or equal to `max` on all axes).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Checks if a point is contained within or on the boundary of the `Aabb`.
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        (point.x >= self.min.x && point.x <= self.max.x)
            && (point.y >= self.min.y && point.y <= self.max.y)
            && (point.z >= self.min.z && point.z <= self.max.z)
    }

    /// Creates a new `Aabb` that encompasses both `self` and `other`.
    #[inline]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// An oriented plane `normal · p + d = 0`.
///
/// Points with a positive signed distance lie on the side the normal points to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// The unit normal of the plane.
    pub normal: Vec3,
    /// The signed offset from the origin along the normal.
    pub d: f32,
}

impl Plane {
    /// Builds a plane with the given normal passing through `point`.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    /// Signed distance from `point` to the plane.
    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// Indices of the six frustum planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum FrustumPlane {
    /// The near clipping plane.
    Near,
    /// The far clipping plane.
    Far,
    /// The left side plane.
    Left,
    /// The right side plane.
    Right,
    /// The bottom side plane.
    Bottom,
    /// The top side plane.
    Top,
}

/// A view frustum made of six inward-facing planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// The planes, indexed by [`FrustumPlane`].
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Builds a perspective frustum from camera parameters.
    ///
    /// `fov_y` is the full vertical field of view in radians. `forward` and
    /// `up` need not be normalized but must not be parallel.
    pub fn from_camera(
        position: Vec3,
        forward: Vec3,
        up: Vec3,
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let f = forward.normalize();
        let r = f.cross(up).normalize();
        let u = r.cross(f);
        let h = (fov_y * 0.5).tan();
        let w = h * aspect;

        let planes = [
            Plane::from_point_normal(position + f * near, f),
            Plane::from_point_normal(position + f * far, -f),
            Plane::from_point_normal(position, r + f * w),
            Plane::from_point_normal(position, -r + f * w),
            Plane::from_point_normal(position, u + f * h),
            Plane::from_point_normal(position, -u + f * h),
        ];
        Self { planes }
    }

    /// Returns the requested plane.
    #[inline]
    pub fn plane(&self, which: FrustumPlane) -> &Plane {
        &self.planes[which as usize]
    }

    /// Checks whether a point is inside the frustum.
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|p| p.signed_distance(point) >= -EPSILON)
    }

    /// Conservative box test: returns `false` only when the box lies entirely
    /// outside at least one plane.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        if !aabb.is_valid() {
            return false;
        }
        self.planes.iter().all(|plane| {
            let n = plane.normal;
            // Corner furthest along the plane normal.
            let positive = Vec3::new(
                if n.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if n.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if n.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.signed_distance(positive) >= -EPSILON
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::FRAC_PI_2;
    use approx::assert_relative_eq;

    fn looking_down_neg_z() -> Frustum {
        Frustum::from_camera(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, FRAC_PI_2, 1.0, 0.1, 100.0)
    }

    #[test]
    fn aabb_from_points_encloses_all() {
        let points = [
            Vec3::new(1.0, -2.0, 3.0),
            Vec3::new(-1.0, 4.0, 0.0),
            Vec3::new(0.5, 0.5, -7.0),
        ];
        let aabb = Aabb::from_points(&points).unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, -7.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 4.0, 3.0));
        assert!(Aabb::from_points(&[]).is_none());
    }

    #[test]
    fn merge_with_invalid_is_identity() {
        let aabb = Aabb::from_center_half_extents(Vec3::ONE, Vec3::splat(2.0));
        assert_eq!(Aabb::INVALID.merge(&aabb), aabb);
        assert!(!Aabb::INVALID.is_valid());
    }

    #[test]
    fn plane_signed_distance() {
        let plane = Plane::from_point_normal(Vec3::new(0.0, 2.0, 0.0), Vec3::Y);
        assert_relative_eq!(plane.signed_distance(Vec3::new(5.0, 5.0, 5.0)), 3.0);
        assert_relative_eq!(plane.signed_distance(Vec3::ZERO), -2.0);
    }

    #[test]
    fn frustum_contains_points_in_front_only() {
        let frustum = looking_down_neg_z();
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -10.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 10.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -200.0)));
        // 90 degree fov: at depth 10 the half width is 10.
        assert!(frustum.contains_point(Vec3::new(9.0, 0.0, -10.0)));
        assert!(!frustum.contains_point(Vec3::new(11.0, 0.0, -10.0)));
    }

    #[test]
    fn frustum_box_test_is_conservative() {
        let frustum = looking_down_neg_z();
        let behind = Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, 20.0), Vec3::ONE);
        let straddling = Aabb::from_center_half_extents(Vec3::new(10.5, 0.0, -10.0), Vec3::ONE);
        let around_eye = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(5.0));
        assert!(!frustum.intersects_aabb(&behind));
        assert!(frustum.intersects_aabb(&straddling));
        assert!(frustum.intersects_aabb(&around_eye));
        assert!(!frustum.intersects_aabb(&Aabb::INVALID));
    }
}
