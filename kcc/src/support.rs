//! Ground support classification.
//!
//! The agent probes downward by `contact_tolerance` over one step and solves that probe against
//! everything within range. How much of the probe the surroundings absorb tells whether the agent
//! stands, slides or falls.

use rapier3d::parry::shape::Shape;

use crate::bodies::RigidBodyStore;
use crate::collision::{
    CollisionQueries, QueryFilter, QueryShape, Transform, Vec3,
    settings::{SOLVER_EPSILON, SOLVER_EPSILON_SQ},
};
use crate::constraint::{SurfaceConstraint, push_constraint};
use crate::integrate::StepInput;
use crate::simplex::{self, SolverParams};

/// Support classification of an agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SupportState {
    /// Nothing beneath the agent stops it from falling.
    #[default]
    Unsupported,
    /// Touching ground that is too steep to stand on.
    Sliding,
    /// Standing on walkable ground.
    Supported,
}

/// Result of [`check_support`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SupportReport {
    pub state: SupportState,
    /// Mean normal of the walkable planes touched by the probe; `up` when there are none.
    pub surface_normal: Vec3,
    /// Mean velocity of the walkable planes touched by the probe.
    pub surface_velocity: Vec3,
}

impl Default for SupportReport {
    fn default() -> Self {
        Self::unsupported(Vec3::y())
    }
}

impl SupportReport {
    pub fn unsupported(up: Vec3) -> Self {
        Self {
            state: SupportState::Unsupported,
            surface_normal: up,
            surface_velocity: Vec3::zeros(),
        }
    }

    #[inline]
    pub fn is_supported(&self) -> bool {
        self.state == SupportState::Supported
    }
}

/// Classify the ground under `shape` posed at `transform`.
pub fn check_support(
    world: &impl CollisionQueries,
    bodies: &impl RigidBodyStore,
    shape: &dyn Shape,
    transform: &Transform,
    input: &StepInput,
) -> SupportReport {
    let up = input.up;
    debug_assert!((up.norm_squared() - 1.0).abs() < 1.0e-3, "up must be normalized");

    let query = QueryShape::new(shape, QueryFilter::excluding(input.self_body));
    let mut hits = Vec::new();
    world.compute_distance(&query, &transform.iso(), input.contact_tolerance, &mut hits);
    if hits.is_empty() {
        return SupportReport::unsupported(up);
    }

    let mut constraints: Vec<SurfaceConstraint> = Vec::with_capacity(hits.len() + 1);
    for hit in &hits {
        push_constraint(
            &mut constraints,
            bodies,
            &up,
            hit,
            input.skin_width,
            input.max_slope_cos,
        );
    }

    // Probe the full tolerance over one step, as if every surface were at rest.
    let initial_velocity = -up * (input.contact_tolerance / input.dt);
    let mut velocity = initial_velocity;
    let mut position = transform.translation;
    let params = SolverParams {
        time_budget: input.dt,
        min_time: input.dt,
        up,
        max_speed: input.max_speed.max(initial_velocity.norm()),
        use_constraint_velocities: false,
    };
    simplex::solve(&params, &mut constraints, &mut position, &mut velocity);

    let mut supporting = 0usize;
    let mut normal_sum = Vec3::zeros();
    let mut velocity_sum = Vec3::zeros();
    // Walls, overhangs and too-steep slopes never hold the agent up, even when the probe hits them.
    let walkable = |c: &&SurfaceConstraint| {
        c.touched && !c.is_max_slope && c.plane.normal.dot(&up) >= input.max_slope_cos
    };
    for c in constraints.iter().filter(walkable) {
        supporting += 1;
        normal_sum += c.plane.normal;
        velocity_sum += c.velocity;
    }

    let (surface_normal, surface_velocity) = if supporting > 0 {
        let inv = 1.0 / supporting as f32;
        (
            (normal_sum * inv).try_normalize(1.0e-6).unwrap_or(up),
            velocity_sum * inv,
        )
    } else {
        (up, Vec3::zeros())
    };

    let state = if (initial_velocity - velocity).norm_squared() < SOLVER_EPSILON_SQ {
        SupportState::Unsupported
    } else if velocity.norm_squared() < SOLVER_EPSILON_SQ && supporting > 0 {
        SupportState::Supported
    } else {
        let direction = velocity.try_normalize(SOLVER_EPSILON).unwrap_or_else(Vec3::zeros);
        let slope_sin = direction.dot(&-up).max(0.0);
        let slope_cos_sq = 1.0 - slope_sin * slope_sin;
        if slope_cos_sq <= input.max_slope_cos * input.max_slope_cos {
            SupportState::Sliding
        } else if supporting > 0 {
            SupportState::Supported
        } else {
            SupportState::Unsupported
        }
    };

    log::trace!(
        "support: {state:?} planes={} supporting={supporting}",
        constraints.len()
    );

    SupportReport {
        state,
        surface_normal,
        surface_velocity,
    }
}
