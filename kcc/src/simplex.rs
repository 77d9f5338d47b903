//! Simplex-style velocity solver over up to four simultaneous contact planes.
//!
//! The solver walks forward in time along the current velocity. Whenever the agent reaches a
//! plane it stops, adds the plane to the active set and re-solves the velocity so it satisfies
//! every active plane, dropping planes that no longer constrain the result. Planes of moving
//! bodies are dropped before planes of static geometry.
//!
//! There is no failure path: degenerate configurations (parallel planes, coplanar triples, four
//! planes that cannot be reduced) fall back to lower-order solves or an average, so the output is
//! always finite.

use arrayvec::ArrayVec;

use crate::collision::{
    Vec3,
    settings::{MAX_SUPPORT_PLANES, SOLVER_EPSILON},
};
use crate::constraint::{SupportPlanes, SurfaceConstraint};

/// Inputs of one [`solve`] call besides the constraints and the state it advances.
#[derive(Clone, Copy, Debug)]
pub struct SolverParams {
    /// Time to integrate (seconds).
    pub time_budget: f32,
    /// The returned integrated time is never below `min(min_time, time_budget)`.
    pub min_time: f32,
    /// World up direction (unit length).
    pub up: Vec3,
    /// Velocity is clamped to this length before solving.
    pub max_speed: f32,
    /// Treat constraint velocities as surface velocities. When false every plane is solved as if
    /// it were at rest (pure geometric test).
    pub use_constraint_velocities: bool,
}

/// Advance `position` and `velocity` through `constraints` for up to `time_budget` seconds.
///
/// Every constraint reached is flagged `touched`. Returns the integrated time.
pub fn solve(
    params: &SolverParams,
    constraints: &mut [SurfaceConstraint],
    position: &mut Vec3,
    velocity: &mut Vec3,
) -> f32 {
    debug_assert!(
        (params.up.norm_squared() - 1.0).abs() < 1.0e-3,
        "up must be normalized"
    );
    debug_assert!(velocity.iter().all(|v| v.is_finite()), "non-finite velocity");

    clamp_to_max_length(params.max_speed, velocity);

    let mut active = SupportPlanes::new();
    let mut remaining = params.time_budget;
    let mut current = 0.0;

    while remaining > 0.0 {
        // Earliest plane reached along the current velocity.
        let mut hit_index = None;
        let mut min_collision_time = remaining;
        for (i, constraint) in constraints.iter().enumerate() {
            if constraint.touched {
                continue;
            }

            let rel_vel =
                *velocity - surface_velocity(constraint, params.use_constraint_velocities);
            let closing_speed = -rel_vel.dot(&constraint.plane.normal);
            if closing_speed < SOLVER_EPSILON {
                continue;
            }

            // Penetration is carried by the constraint velocity already.
            let distance = constraint.plane.distance.max(0.0);
            if distance <= min_collision_time * closing_speed {
                min_collision_time = distance / closing_speed;
                hit_index = Some(i);
            }
        }

        let Some(hit_index) = hit_index else {
            current += remaining;
            *position += *velocity * remaining;
            break;
        };

        current += min_collision_time;
        remaining -= min_collision_time;
        *position += *velocity * min_collision_time;

        constraints[hit_index].touched = true;
        let mut plane = constraints[hit_index];
        if !params.use_constraint_velocities {
            plane.velocity = Vec3::zeros();
        }
        active.push(plane);

        examine_active_planes(&mut active, velocity);
        log::trace!(
            "simplex: t={current:.5} active={} v=({:.3}, {:.3}, {:.3})",
            active.len(),
            velocity.x,
            velocity.y,
            velocity.z
        );

        if active.is_full() {
            break;
        }
    }

    // Time padded up to the floor is spent in place.
    current.max(params.min_time.min(params.time_budget))
}

/// Scale `velocity` down to `max_length` if it is longer.
#[inline]
pub fn clamp_to_max_length(max_length: f32, velocity: &mut Vec3) {
    let len_sq = velocity.norm_squared();
    if len_sq > max_length * max_length && len_sq > 0.0 {
        *velocity *= max_length / len_sq.sqrt();
    }
}

#[inline]
fn surface_velocity(constraint: &SurfaceConstraint, use_constraint_velocities: bool) -> Vec3 {
    if use_constraint_velocities {
        constraint.velocity
    } else {
        Vec3::zeros()
    }
}

/// Re-solve `velocity` against the active set, dropping planes it does not need.
///
/// The newest plane (last) is always kept. Older planes are removal candidates, movable-body
/// planes first, then oldest first.
fn examine_active_planes(active: &mut SupportPlanes, velocity: &mut Vec3) {
    let count = active.len();
    if count == 1 {
        solve_1d(&active[0], velocity);
        return;
    }

    let mut candidates: ArrayVec<usize, MAX_SUPPORT_PLANES> = (0..count - 1).collect();
    candidates.sort_by_key(|&i| std::cmp::Reverse(active[i].priority));

    for candidate in candidates {
        let trial = {
            let others: ArrayVec<&SurfaceConstraint, MAX_SUPPORT_PLANES> = active
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != candidate)
                .map(|(_, plane)| plane)
                .collect();
            let mut trial = *velocity;
            solve_subset(&others, &mut trial);
            trial
        };
        if !test_1d(&active[candidate], &trial) {
            active.remove(candidate);
            *velocity = trial;
            return;
        }
    }

    match count {
        2 => solve_2d(&active[0], &active[1], velocity),
        3 => solve_3d(&active[0], &active[1], &active[2], velocity),
        _ => solve_4d_fallback(active, velocity),
    }
}

fn solve_subset(planes: &[&SurfaceConstraint], velocity: &mut Vec3) {
    match *planes {
        [a] => solve_1d(a, velocity),
        [a, b] => solve_2d(a, b, velocity),
        [a, b, c] => solve_3d(a, b, c, velocity),
        _ => {}
    }
}

/// True when `velocity` still moves into the plane, i.e. the plane is needed.
#[inline]
fn test_1d(constraint: &SurfaceConstraint, velocity: &Vec3) -> bool {
    let rel_vel = velocity - constraint.velocity;
    rel_vel.dot(&constraint.plane.normal) < -SOLVER_EPSILON
}

/// Remove the normal component of the velocity relative to the plane's surface.
fn solve_1d(constraint: &SurfaceConstraint, velocity: &mut Vec3) {
    let normal = &constraint.plane.normal;
    let mut rel_vel = *velocity - constraint.velocity;
    rel_vel -= normal * rel_vel.dot(normal);
    *velocity = rel_vel + constraint.velocity;
}

/// Slide along the edge shared by two planes.
fn solve_2d(c0: &SurfaceConstraint, c1: &SurfaceConstraint, velocity: &mut Vec3) {
    let n0 = c0.plane.normal;
    let n1 = c1.plane.normal;

    let axis = n0.cross(&n1);
    let axis_len_sq = axis.norm_squared();
    if axis_len_sq < SOLVER_EPSILON {
        // Parallel planes: solve them one after the other, static geometry last.
        let (first, last) = by_priority_desc(c0, c1);
        solve_1d(first, velocity);
        solve_1d(last, velocity);
        return;
    }

    let inv_axis_len = axis_len_sq.sqrt().recip();
    let axis = axis * inv_axis_len;

    // Velocity of the edge itself: the point satisfying
    //   axis·x = mean surface velocity along the edge, n0·x = n0·v0, n1·x = n1·v1.
    // Its determinant is axis·(n0 × n1) = |n0 × n1|.
    let edge_velocity = {
        let t_axis = axis.dot(&(c0.velocity + c1.velocity)) * 0.5;
        let t0 = n0.dot(&c0.velocity);
        let t1 = n1.dot(&c1.velocity);
        (n0.cross(&n1) * t_axis + n1.cross(&axis) * t0 + axis.cross(&n0) * t1) * inv_axis_len
    };

    let rel_vel = *velocity - edge_velocity;
    *velocity = edge_velocity + axis * rel_vel.dot(&axis);
}

/// The unique velocity satisfying three planes, by Cramer's rule.
fn solve_3d(
    c0: &SurfaceConstraint,
    c1: &SurfaceConstraint,
    c2: &SurfaceConstraint,
    velocity: &mut Vec3,
) {
    let n0 = c0.plane.normal;
    let n1 = c1.plane.normal;
    let n2 = c2.plane.normal;

    let n1_x_n2 = n1.cross(&n2);
    let det = n0.dot(&n1_x_n2);
    if det.abs() < SOLVER_EPSILON {
        // Degenerate triple: pairwise edge solves, lowest priority value (static) honored last.
        let mut sorted = [c0, c1, c2];
        sorted.sort_by_key(|c| c.priority);
        let [s0, s1, s2] = sorted;
        solve_2d(s1, s2, velocity);
        solve_2d(s0, s2, velocity);
        solve_2d(s0, s1, velocity);
        return;
    }

    let t = Vec3::new(
        n0.dot(&c0.velocity),
        n1.dot(&c1.velocity),
        n2.dot(&c2.velocity),
    );
    *velocity = (n1_x_n2 * t.x + n2.cross(&n0) * t.y + n0.cross(&n1) * t.z) / det;
}

/// Four planes none of which can be dropped: average the solutions of every triple.
fn solve_4d_fallback(active: &SupportPlanes, velocity: &mut Vec3) {
    let input = *velocity;
    let mut sum = Vec3::zeros();
    for skip in 0..active.len() {
        let triple: ArrayVec<&SurfaceConstraint, MAX_SUPPORT_PLANES> = active
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != skip)
            .map(|(_, plane)| plane)
            .collect();

        let mut trial = input;
        solve_subset(&triple, &mut trial);
        sum += trial;
    }
    *velocity = sum / active.len() as f32;
}

/// Order two planes so the one with the lower priority value comes last.
#[inline]
fn by_priority_desc<'a>(
    c0: &'a SurfaceConstraint,
    c1: &'a SurfaceConstraint,
) -> (&'a SurfaceConstraint, &'a SurfaceConstraint) {
    if c0.priority < c1.priority {
        (c1, c0)
    } else {
        (c0, c1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{BodyIndex, ColliderKey, Point};
    use crate::constraint::{DYNAMIC_PRIORITY, Plane, STATIC_PRIORITY};

    fn plane(normal: Vec3, distance: f32) -> SurfaceConstraint {
        SurfaceConstraint {
            plane: Plane {
                normal: normal.normalize(),
                distance,
            },
            velocity: Vec3::zeros(),
            body: BodyIndex(0),
            key: ColliderKey(0),
            hit_position: Point::origin(),
            priority: STATIC_PRIORITY,
            touched: false,
            is_too_steep: false,
            is_max_slope: false,
            penetration: 0.0,
        }
    }

    fn params(time_budget: f32) -> SolverParams {
        SolverParams {
            time_budget,
            min_time: 0.0,
            up: Vec3::y(),
            max_speed: 100.0,
            use_constraint_velocities: true,
        }
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).norm() < 1.0e-4
    }

    #[test]
    fn single_plane_removes_normal_component() {
        let mut constraints = [plane(Vec3::new(0.3, 1.0, -0.2), 0.0)];
        let n = constraints[0].plane.normal;
        let v0 = Vec3::new(2.0, -3.0, 1.0);
        let mut v = v0;
        let mut p = Vec3::zeros();

        solve(&params(1.0), &mut constraints, &mut p, &mut v);

        assert!(v.dot(&n).abs() < 1.0e-4);
        // The change is parallel to the normal.
        assert!((v - v0).cross(&n).norm() < 1.0e-4);
        assert!(constraints[0].touched);
    }

    #[test]
    fn moving_surface_velocity_is_respected() {
        let mut c = plane(Vec3::y(), 0.0);
        c.velocity = Vec3::new(0.0, 1.0, 0.0);
        let mut v = Vec3::new(1.0, -2.0, 0.0);
        let mut p = Vec3::zeros();

        solve(&params(1.0), &mut [c], &mut p, &mut v);

        assert!(approx(v, Vec3::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn integrates_up_to_the_first_contact() {
        let mut constraints = [plane(Vec3::y(), 0.5)];
        let mut v = Vec3::new(1.0, -1.0, 0.0);
        let mut p = Vec3::zeros();

        let t = solve(&params(2.0), &mut constraints, &mut p, &mut v);

        assert!((t - 2.0).abs() < 1.0e-5);
        // 0.5 s falling and sliding, then 1.5 s of pure sliding.
        assert!(approx(p, Vec3::new(2.0, -0.5, 0.0)));
        assert!(approx(v, Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn separating_planes_are_never_touched() {
        let mut constraints = [plane(Vec3::y(), 0.0)];
        let mut v = Vec3::new(0.0, 2.0, 0.0);
        let mut p = Vec3::zeros();

        let t = solve(&params(0.5), &mut constraints, &mut p, &mut v);

        assert!(!constraints[0].touched);
        assert!(approx(p, Vec3::new(0.0, 1.0, 0.0)));
        assert!((t - 0.5).abs() < 1.0e-6);
    }

    #[test]
    fn corner_of_two_walls_slides_along_the_edge() {
        let mut constraints = [plane(Vec3::x(), 0.0), plane(Vec3::z(), 0.0)];
        let mut v = Vec3::new(-1.0, 0.5, -1.0);
        let mut p = Vec3::zeros();

        solve(&params(1.0), &mut constraints, &mut p, &mut v);

        assert!(approx(v, Vec3::new(0.0, 0.5, 0.0)));
    }

    #[test]
    fn unneeded_older_plane_is_dropped() {
        let mut active = SupportPlanes::new();
        // Wall first, then a floor; sliding on the floor moves away from the wall.
        active.push(plane(Vec3::new(1.0, 0.0, 0.0), 0.0));
        active.push(plane(Vec3::y(), 0.0));
        let mut v = Vec3::new(1.0, -1.0, 0.0);

        examine_active_planes(&mut active, &mut v);

        assert_eq!(active.len(), 1);
        assert!(approx(active[0].plane.normal, Vec3::y()));
        assert!(approx(v, Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn parallel_planes_honor_static_plane_last() {
        let mut dynamic = plane(Vec3::y(), 0.0);
        dynamic.priority = DYNAMIC_PRIORITY;
        dynamic.velocity = Vec3::new(0.0, 3.0, 0.0);
        let fixed = plane(Vec3::y(), 0.0);

        for (a, b) in [(&dynamic, &fixed), (&fixed, &dynamic)] {
            let mut v = Vec3::new(1.0, -1.0, 0.0);
            solve_2d(a, b, &mut v);
            assert!(approx(v, Vec3::new(1.0, 0.0, 0.0)));
        }
    }

    #[test]
    fn edge_of_moving_floor_and_wall_carries_both_surface_velocities() {
        // Rising floor against a wall pushing along +X: the edge runs along Z.
        let mut floor = plane(Vec3::y(), 0.0);
        floor.priority = DYNAMIC_PRIORITY;
        floor.velocity = Vec3::new(0.0, 1.0, 0.0);
        let mut wall = plane(Vec3::x(), 0.0);
        wall.priority = DYNAMIC_PRIORITY;
        wall.velocity = Vec3::new(0.5, 0.0, 0.0);

        for (a, b) in [(&floor, &wall), (&wall, &floor)] {
            let mut v = Vec3::new(-3.0, -3.0, 4.0);
            solve_2d(a, b, &mut v);
            assert!(approx(v, Vec3::new(0.5, 1.0, 4.0)), "{v:?}");
        }
    }

    #[test]
    fn solving_into_moving_corner_keeps_up_with_both_planes() {
        let mut floor = plane(Vec3::y(), 0.0);
        floor.velocity = Vec3::new(0.0, 1.0, 0.0);
        let mut wall = plane(Vec3::x(), 0.0);
        wall.velocity = Vec3::new(0.5, 0.0, 0.0);
        let mut constraints = [floor, wall];
        let mut v = Vec3::new(-3.0, -3.0, 4.0);
        let mut p = Vec3::zeros();

        solve(&params(1.0), &mut constraints, &mut p, &mut v);

        assert!(constraints.iter().all(|c| c.touched));
        assert!(v.dot(&Vec3::y()) >= 1.0 - 1.0e-4);
        assert!(v.dot(&Vec3::x()) >= 0.5 - 1.0e-4);
        assert!((v.z - 4.0).abs() < 1.0e-4);
    }

    #[test]
    fn three_walls_pin_velocity_to_surface_velocities() {
        let mut a = plane(Vec3::x(), 0.0);
        a.velocity = Vec3::new(1.0, 0.0, 0.0);
        let b = plane(Vec3::y(), 0.0);
        let c = plane(Vec3::z(), 0.0);
        let mut v = Vec3::new(-5.0, -5.0, -5.0);

        solve_3d(&a, &b, &c, &mut v);

        assert!(approx(v, Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn coplanar_triple_falls_back_to_edge_solves() {
        // Three normals in the XY plane: determinant is zero.
        let a = plane(Vec3::new(1.0, 1.0, 0.0), 0.0);
        let b = plane(Vec3::new(-1.0, 1.0, 0.0), 0.0);
        let c = plane(Vec3::y(), 0.0);
        let mut v = Vec3::new(0.0, -1.0, 2.0);

        solve_3d(&a, &b, &c, &mut v);

        assert!(v.iter().all(|x| x.is_finite()));
        assert!(approx(v, Vec3::new(0.0, 0.0, 2.0)));
    }

    #[test]
    fn four_incompatible_planes_stay_finite() {
        let normals = [
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, -1.0),
        ];
        let mut constraints: Vec<_> = normals.iter().map(|&n| plane(n, 0.0)).collect();
        for (i, c) in constraints.iter_mut().enumerate() {
            c.velocity = c.plane.normal * (i as f32 + 1.0);
        }
        let mut v = Vec3::new(0.3, -4.0, 0.2);
        let mut p = Vec3::zeros();

        let t = solve(&params(1.0), &mut constraints, &mut p, &mut v);

        assert!(v.iter().all(|x| x.is_finite()));
        assert!(p.iter().all(|x| x.is_finite()));
        assert!(t.is_finite());
    }

    #[test]
    fn four_plane_fallback_is_an_average() {
        let mut active = SupportPlanes::new();
        for n in [Vec3::x(), -Vec3::x(), Vec3::z(), -Vec3::z()] {
            let mut c = plane(n, 0.0);
            c.velocity = n;
            active.push(c);
        }
        let mut v = Vec3::new(0.0, -1.0, 0.0);

        solve_4d_fallback(&active, &mut v);

        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn integrated_time_never_below_floor() {
        let mut constraints = [plane(Vec3::x(), 0.0), plane(-Vec3::x(), 0.0)];
        let mut v = Vec3::new(0.0, 0.0, 0.0);
        let mut p = Vec3::zeros();
        let mut floor = params(1.0);
        floor.min_time = 0.25;

        let t = solve(&floor, &mut constraints, &mut p, &mut v);
        assert!((t - 1.0).abs() < 1.0e-6);

        floor.time_budget = 0.1;
        let t = solve(&floor, &mut constraints, &mut p, &mut v);
        assert!((t - 0.1).abs() < 1.0e-6);
    }

    #[test]
    fn velocity_is_clamped_to_max_speed() {
        let mut v = Vec3::new(30.0, 40.0, 0.0);
        clamp_to_max_length(5.0, &mut v);
        assert!(approx(v, Vec3::new(3.0, 4.0, 0.0)));

        let mut slow = Vec3::new(1.0, 0.0, 0.0);
        clamp_to_max_length(5.0, &mut slow);
        assert_eq!(slow, Vec3::new(1.0, 0.0, 0.0));
    }
}
