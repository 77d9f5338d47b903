//! Rigid body store consumed by the controller.
//!
//! The controller needs very little from the bodies it touches: the velocity of a surface point
//! (to ride moving platforms and to compute relative velocities), the mass properties at a point
//! (to size impulses) and a single mutation, applying an impulse, which only ever happens in the
//! serial phase after every agent of a batch has finished.
//!
//! Rapier's [`RigidBodySet`] is the store. A [`BodyIndex`] is the arena slot of a
//! [`RigidBodyHandle`], so colliders can name their body without carrying a generation.

use rapier3d::prelude::{ColliderSet, RigidBody, RigidBodyHandle, RigidBodySet};

use crate::collision::{BodyIndex, Mat3, Point, Vec3};

/// Read access to body motion and mass properties, plus the one write the controller performs.
pub trait RigidBodyStore {
    /// True for anything that can move (kinematic or dynamic bodies).
    fn is_dynamic(&self, body: BodyIndex) -> bool;

    /// World-space velocity of the material point of `body` located at `point`.
    fn velocity_at_point(&self, body: BodyIndex, point: &Point) -> Vec3;

    /// Inverse mass; zero for static and kinematic bodies.
    fn inv_mass(&self, body: BodyIndex) -> f32;

    /// World-space inverse inertia tensor; zero for static and kinematic bodies.
    fn world_inv_inertia(&self, body: BodyIndex) -> Mat3;

    /// World-space center of mass.
    fn center_of_mass(&self, body: BodyIndex) -> Point;

    /// Apply `impulse` at world point `point`. Bodies with zero inverse mass are unaffected.
    fn apply_impulse(&mut self, body: BodyIndex, impulse: &Vec3, point: &Point);
}

impl From<RigidBodyHandle> for BodyIndex {
    fn from(handle: RigidBodyHandle) -> Self {
        BodyIndex(handle.into_raw_parts().0)
    }
}

/// Look up the body living in slot `index`.
#[inline]
pub fn body(bodies: &RigidBodySet, index: BodyIndex) -> Option<&RigidBody> {
    bodies.get_unknown_gen(index.0).map(|(rb, _)| rb)
}

/// Insert a body and bring its world mass properties up to date.
///
/// Rapier only refreshes mass properties during a pipeline step. Bodies inserted through this
/// helper can be pushed by the controller before the first step.
pub fn insert_body(bodies: &mut RigidBodySet, rb: impl Into<RigidBody>) -> BodyIndex {
    let handle = bodies.insert(rb);
    if let Some(rb) = bodies.get_mut(handle) {
        rb.recompute_mass_properties_from_colliders(&ColliderSet::new());
    }
    handle.into()
}

impl RigidBodyStore for RigidBodySet {
    fn is_dynamic(&self, index: BodyIndex) -> bool {
        body(self, index).is_some_and(RigidBody::is_dynamic_or_kinematic)
    }

    fn velocity_at_point(&self, index: BodyIndex, point: &Point) -> Vec3 {
        body(self, index).map_or_else(Vec3::zeros, |rb| rb.velocity_at_point(point))
    }

    fn inv_mass(&self, index: BodyIndex) -> f32 {
        body(self, index)
            .filter(|rb| rb.is_dynamic())
            .map_or(0.0, |rb| rb.mass_properties().effective_inv_mass.max())
    }

    fn world_inv_inertia(&self, index: BodyIndex) -> Mat3 {
        body(self, index)
            .filter(|rb| rb.is_dynamic())
            .map_or_else(Mat3::zeros, |rb| {
                rb.mass_properties().effective_world_inv_inertia * Mat3::identity()
            })
    }

    fn center_of_mass(&self, index: BodyIndex) -> Point {
        body(self, index).map_or_else(Point::origin, |rb| *rb.center_of_mass())
    }

    fn apply_impulse(&mut self, index: BodyIndex, impulse: &Vec3, point: &Point) {
        if let Some((rb, _)) = self.get_unknown_gen_mut(index.0) {
            rb.apply_impulse_at_point(*impulse, *point, true);
        }
    }
}

/// Inverse of the effective mass of `body` along `normal` at world point `point`:
/// `1/m + (r × n) · I⁻¹ (r × n)`.
pub fn inv_mass_at_point(
    bodies: &impl RigidBodyStore,
    body: BodyIndex,
    point: &Point,
    normal: &Vec3,
) -> f32 {
    let arm = point - bodies.center_of_mass(body);
    let jac_ang = arm.cross(normal);
    bodies.inv_mass(body) + jac_ang.dot(&(bodies.world_inv_inertia(body) * jac_ang))
}


#[cfg(test)]
mod tests {
    use super::test_bodies::{dynamic_cuboid, fixed, kinematic};
    use super::*;

    fn crate_box(bodies: &mut RigidBodySet) -> BodyIndex {
        dynamic_cuboid(bodies, Vec3::new(0.0, 1.0, 0.0), 2.0, Vec3::repeat(0.5))
    }

    #[test]
    fn handles_map_to_their_slot() {
        let mut bodies = RigidBodySet::new();
        let a = fixed(&mut bodies);
        let b = fixed(&mut bodies);

        assert_eq!(a, BodyIndex(0));
        assert_eq!(b, BodyIndex(1));
        assert!(body(&bodies, b).is_some_and(|rb| rb.is_fixed()));
        assert!(body(&bodies, BodyIndex(9)).is_none());
    }

    #[test]
    fn static_bodies_ignore_impulses() {
        let mut bodies = RigidBodySet::new();
        let ground = fixed(&mut bodies);

        bodies.apply_impulse(ground, &Vec3::new(1.0, 0.0, 0.0), &Point::origin());

        assert!(!bodies.is_dynamic(ground));
        assert_eq!(body(&bodies, ground).map(|rb| *rb.linvel()), Some(Vec3::zeros()));
        assert_eq!(bodies.inv_mass(ground), 0.0);
    }

    #[test]
    fn kinematic_bodies_move_but_ignore_impulses() {
        let mut bodies = RigidBodySet::new();
        let platform = kinematic(&mut bodies, Vec3::new(1.0, 0.0, 0.0));

        bodies.apply_impulse(platform, &Vec3::new(0.0, 5.0, 0.0), &Point::origin());

        assert!(bodies.is_dynamic(platform));
        assert_eq!(
            bodies.velocity_at_point(platform, &Point::new(3.0, 0.0, 0.0)),
            Vec3::new(1.0, 0.0, 0.0)
        );
        assert_eq!(bodies.inv_mass(platform), 0.0);
    }

    #[test]
    fn central_impulse_changes_only_linear_velocity() {
        let mut bodies = RigidBodySet::new();
        let b = crate_box(&mut bodies);

        bodies.apply_impulse(b, &Vec3::new(4.0, 0.0, 0.0), &Point::new(0.0, 1.0, 0.0));

        let rb = body(&bodies, b).expect("body");
        assert!((rb.linvel() - Vec3::new(2.0, 0.0, 0.0)).norm() < 1.0e-5);
        assert!(rb.angvel().norm() < 1.0e-5);
    }

    #[test]
    fn off_center_impulse_spins_the_body() {
        let mut bodies = RigidBodySet::new();
        let b = crate_box(&mut bodies);

        // Push +X on the top face: spins about -Z.
        bodies.apply_impulse(b, &Vec3::new(1.0, 0.0, 0.0), &Point::new(0.0, 1.5, 0.0));

        let rb = body(&bodies, b).expect("body");
        assert!(rb.angvel().z < 0.0);
        let top_velocity = rb.velocity_at_point(&Point::new(0.0, 1.5, 0.0));
        assert!(top_velocity.x > rb.linvel().x);
    }

    #[test]
    fn effective_mass_grows_with_lever_arm() {
        let mut bodies = RigidBodySet::new();
        let b = crate_box(&mut bodies);
        let n = Vec3::x();

        let center = inv_mass_at_point(&bodies, b, &Point::new(0.0, 1.0, 0.0), &n);
        let edge = inv_mass_at_point(&bodies, b, &Point::new(0.0, 1.5, 0.0), &n);

        assert!((center - 0.5).abs() < 1.0e-5);
        assert!(edge > center);
    }
}
