/*!
Core collision types and math aliases shared by the collision submodules.

This module intentionally contains no algorithms. It defines the data types
exchanged between:
- broad (static world acceleration structures and candidate queries)
- narrow_phase (parry shape casts and contact queries)
- the query provider consumed by the support check and the integrator

Conventions
- Units are meters, seconds and kilograms.
- Hit normals are world-space unit vectors pointing from the obstacle toward the
  querying shape, so a normal is always the direction the character is pushed.
*/

use nalgebra as na;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;
pub type Point = na::Point3<f32>;
pub type Mat3 = na::Matrix3<f32>;

/// Stable index of a rigid body in a [`RigidBodyStore`](crate::bodies::RigidBodyStore).
///
/// For rapier's `RigidBodySet` this is the arena slot of the body's handle. A slot freed by
/// removing a body is reused by the next insertion, so colliders must be rebuilt after removals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyIndex(pub u32);

/// Identifies one collider among those attached to a body.
///
/// Together with the [`BodyIndex`] this uniquely names the thing that was hit, which is what
/// constraint de-duplication and impulse attribution key on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColliderKey(pub u32);

/// A rigid transform (isometry) in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_translation(Vec3::zeros())
    }
}

impl Transform {
    #[inline]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::identity())
    }

    /// Convert to nalgebra `Isometry3` for use with parry narrow-phase queries.
    #[inline]
    pub fn iso(&self) -> Iso {
        Iso::from_parts(
            na::Translation3::new(self.translation.x, self.translation.y, self.translation.z),
            self.rotation,
        )
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.translation.iter().all(|v| v.is_finite())
            && self.rotation.coords.iter().all(|v| v.is_finite())
    }
}

/// One collider touched by a swept shape query.
#[derive(Clone, Copy, Debug)]
pub struct CastHit {
    pub body: BodyIndex,
    pub key: ColliderKey,
    /// Fraction (0..1) of the tested displacement where the hit occurred.
    pub fraction: f32,
    /// World-space contact point on the obstacle.
    pub position: Point,
    /// World-space surface normal of the obstacle (points toward the caster).
    pub normal: Vec3,
}

/// One collider found within range of a distance query.
#[derive(Clone, Copy, Debug)]
pub struct DistanceHit {
    pub body: BodyIndex,
    pub key: ColliderKey,
    /// Signed separation in meters; negative when penetrating.
    pub distance: f32,
    /// World-space closest point on the obstacle.
    pub position: Point,
    /// World-space surface normal of the obstacle (points toward the queried shape).
    pub normal: Vec3,
}
