//! Surface constraints: one half-space restriction on the agent's velocity per collision hit.
//!
//! Constraints are rebuilt from scratch every solver iteration and never outlive a step.

use arrayvec::ArrayVec;

use crate::bodies::RigidBodyStore;
use crate::collision::{
    BodyIndex, ColliderKey, DistanceHit, Point, Vec3,
    settings::{MAX_SLOPE_DISTANCE_FLOOR, MAX_SUPPORT_PLANES, SOLVER_EPSILON},
};

/// Priority of planes belonging to static geometry. Solved last, dropped last.
pub const STATIC_PRIORITY: u8 = 0;
/// Priority of planes belonging to bodies that can move. Preferred removal candidates.
pub const DYNAMIC_PRIORITY: u8 = 1;

/// A contact plane: unit normal plus signed distance along it (negative = penetrating).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

/// One contact candidate fed to the simplex solver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceConstraint {
    pub plane: Plane,
    /// Velocity of the surface at the hit point, plus any penetration recovery bias.
    pub velocity: Vec3,
    pub body: BodyIndex,
    pub key: ColliderKey,
    pub hit_position: Point,
    /// [`STATIC_PRIORITY`] or [`DYNAMIC_PRIORITY`].
    pub priority: u8,
    /// Set by the solver once the plane has been reached this solve.
    pub touched: bool,
    /// Raw plane steeper than the walkable slope (it is preceded by a max-slope plane).
    pub is_too_steep: bool,
    /// Synthesized vertical plane standing in for a too-steep one.
    pub is_max_slope: bool,
    /// Signed distance moved into `velocity` by [`Self::resolve_penetration`] (zero or negative).
    pub penetration: f32,
}

/// The solver's active plane set: a fixed-capacity inline array, never heap allocated.
pub type SupportPlanes = ArrayVec<SurfaceConstraint, MAX_SUPPORT_PLANES>;

impl SurfaceConstraint {
    /// Build the raw constraint for a hit at `distance` from the agent.
    ///
    /// The plane keeps `skin_width` of separation. Moving bodies lend their point velocity to the
    /// plane and get the higher (more removable) priority.
    pub fn from_hit(bodies: &impl RigidBodyStore, hit: &DistanceHit, skin_width: f32) -> Self {
        let is_dynamic = bodies.is_dynamic(hit.body);
        Self {
            plane: Plane {
                normal: hit.normal,
                distance: hit.distance - skin_width,
            },
            velocity: if is_dynamic {
                bodies.velocity_at_point(hit.body, &hit.position)
            } else {
                Vec3::zeros()
            },
            body: hit.body,
            key: hit.key,
            hit_position: hit.position,
            priority: if is_dynamic {
                DYNAMIC_PRIORITY
            } else {
                STATIC_PRIORITY
            },
            touched: false,
            is_too_steep: false,
            is_max_slope: false,
            penetration: 0.0,
        }
    }

    /// True when this constraint was built from the collider `(body, key)`.
    #[inline]
    pub fn same_collider(&self, body: BodyIndex, key: ColliderKey) -> bool {
        self.body == body && self.key == key
    }

    /// Turn penetration into velocity: a penetrating plane gets distance 0 and a surface velocity
    /// that pushes the agent out by the penetration depth per second.
    #[inline]
    pub fn resolve_penetration(&mut self) {
        if self.plane.distance < 0.0 {
            self.velocity -= self.plane.normal * self.plane.distance;
            self.penetration = self.plane.distance;
            self.plane.distance = 0.0;
        }
    }

    /// Synthesize the vertical plane standing in for this (too steep) plane.
    ///
    /// The new distance is this plane's distance measured along the new normal, clamped so it is
    /// at most `1 / MAX_SLOPE_DISTANCE_FLOOR` times the original. When the result penetrates,
    /// recovery moves to the max-slope plane and this plane's distance is zeroed.
    pub fn max_slope_plane(&mut self, up: &Vec3) -> SurfaceConstraint {
        let vertical = self.plane.normal.dot(up);

        let mut max_slope = *self;
        max_slope.plane.normal = (self.plane.normal - up * vertical)
            .try_normalize(SOLVER_EPSILON)
            .unwrap_or(self.plane.normal);
        max_slope.is_max_slope = true;
        max_slope.is_too_steep = false;

        let cos = max_slope
            .plane
            .normal
            .dot(&self.plane.normal)
            .max(MAX_SLOPE_DISTANCE_FLOOR);
        max_slope.plane.distance = self.plane.distance / cos;

        if max_slope.plane.distance < 0.0 {
            self.plane.distance = 0.0;
            max_slope.resolve_penetration();
        }

        max_slope
    }
}

/// Add the constraint(s) for one hit to `constraints`.
///
/// A plane whose vertical component is positive but below `max_slope_cos` is too steep to stand
/// on: a max-slope plane is pushed ahead of it so the agent cannot be propped up on it.
pub fn push_constraint(
    constraints: &mut Vec<SurfaceConstraint>,
    bodies: &impl RigidBodyStore,
    up: &Vec3,
    hit: &DistanceHit,
    skin_width: f32,
    max_slope_cos: f32,
) {
    let mut constraint = SurfaceConstraint::from_hit(bodies, hit, skin_width);

    let vertical = constraint.plane.normal.dot(up);
    if vertical > SOLVER_EPSILON && vertical < max_slope_cos {
        constraint.is_too_steep = true;
        let max_slope = constraint.max_slope_plane(up);
        constraints.push(max_slope);
    }

    constraint.resolve_penetration();
    constraints.push(constraint);
}
