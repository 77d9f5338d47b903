//! Collide-and-integrate: move one agent through the world for one step.
//!
//! Each iteration rebuilds the contact planes around the agent (penetration recovery first, then
//! whatever the remaining motion would sweep through), lets the simplex solver advance along them,
//! and double checks the solver's displacement with a second cast. Impulses for bodies the agent
//! pushes are only recorded, never applied.

use rapier3d::parry::shape::Shape;

use crate::bodies::{RigidBodyStore, inv_mass_at_point};
use crate::collision::{
    BodyIndex, CastHit, CastHits, ColliderKey, CollisionQueries, DistanceHit, Point, QueryFilter,
    QueryShape, Transform, Vec3,
    settings::{MIN_TRAVEL_DISTANCE, SOLVER_EPSILON, SOLVER_EPSILON_SQ, TIME_EPSILON},
};
use crate::constraint::{SurfaceConstraint, push_constraint};
use crate::impulse::ImpulseWriter;
use crate::simplex::{self, SolverParams};

/// Per-step solver input shared by the support check and the integrator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepInput {
    /// Step length (seconds).
    pub dt: f32,
    /// World up direction (unit length).
    pub up: Vec3,
    pub gravity: Vec3,
    /// Cosine of the steepest walkable slope.
    pub max_slope_cos: f32,
    pub skin_width: f32,
    pub contact_tolerance: f32,
    pub max_iterations: u32,
    pub max_speed: f32,
    /// Penetration recovery factor for impulses.
    pub tau: f32,
    /// Approach velocity damping for impulses.
    pub damping: f32,
    /// The agent's own body, excluded from every query.
    pub self_body: Option<BodyIndex>,
}

/// Which events [`collide_and_integrate`] records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventRequest {
    pub contacts: bool,
    pub triggers: bool,
}

impl EventRequest {
    pub const ALL: Self = Self {
        contacts: true,
        triggers: true,
    };
}

/// A collider the agent touched during the step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactEvent {
    pub body: BodyIndex,
    pub key: ColliderKey,
    pub normal: Vec3,
    pub position: Point,
    /// Sum of impulses recorded for this collider during the step (zero if none).
    pub impulse: Vec3,
}

/// A trigger collider the agent swept through during the step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerEvent {
    pub body: BodyIndex,
    pub key: ColliderKey,
    pub position: Point,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepEvents {
    pub contacts: Vec<ContactEvent>,
    pub triggers: Vec<TriggerEvent>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntegrateReport {
    /// Iterations run.
    pub iterations: u32,
    /// Step time left unconsumed when the iteration cap was hit. It is dropped, not carried over.
    pub remaining_time: f32,
    pub events: StepEvents,
}

/// Move `shape` from `transform` with `velocity` for `input.dt` seconds.
///
/// `transform` and `velocity` are updated in place. When `affects_other_bodies` is set, impulses
/// for every dynamic body touched are pushed to `writer` for the serial apply pass.
pub fn collide_and_integrate(
    world: &impl CollisionQueries,
    bodies: &impl RigidBodyStore,
    shape: &dyn Shape,
    input: &StepInput,
    mass: f32,
    affects_other_bodies: bool,
    events: EventRequest,
    transform: &mut Transform,
    velocity: &mut Vec3,
    writer: &mut ImpulseWriter,
) -> IntegrateReport {
    debug_assert!(transform.is_finite(), "non-finite transform");
    debug_assert!(velocity.iter().all(|v| v.is_finite()), "non-finite velocity");

    let query = QueryShape::new(
        shape,
        QueryFilter::excluding(input.self_body).with_triggers(events.triggers),
    );
    let rotation = transform.rotation;
    let mut position = transform.translation;
    let mut new_velocity = *velocity;
    let mut remaining = input.dt;
    let mut report = IntegrateReport::default();

    let mut constraints: Vec<SurfaceConstraint> = Vec::new();
    let mut distance_hits: Vec<DistanceHit> = Vec::new();
    let mut cast_hits = CastHits::default();

    while remaining > TIME_EPSILON {
        if report.iterations >= input.max_iterations {
            log::debug!(
                "collide_and_integrate: {} iterations used, dropping {remaining:.6}s",
                report.iterations
            );
            break;
        }
        report.iterations += 1;

        constraints.clear();
        let pose = Transform::new(position, rotation).iso();

        // Recover from anything already within the skin.
        world.compute_distance(&query, &pose, input.skin_width, &mut distance_hits);
        for hit in &distance_hits {
            push_constraint(
                &mut constraints,
                bodies,
                &input.up,
                hit,
                input.skin_width,
                input.max_slope_cos,
            );
        }

        // Everything the remaining motion would reach.
        let displacement = new_velocity * remaining;
        world.cast_shape(&query, &pose, &displacement, &mut cast_hits);
        for hit in &cast_hits.hits {
            if is_constrained(&constraints, hit) {
                continue;
            }
            let distance_hit = DistanceHit {
                body: hit.body,
                key: hit.key,
                distance: hit.fraction * (-hit.normal).dot(&displacement),
                position: hit.position,
                normal: hit.normal,
            };
            push_constraint(
                &mut constraints,
                bodies,
                &input.up,
                &distance_hit,
                input.skin_width,
                input.max_slope_cos,
            );
        }
        if events.triggers {
            record_triggers(&cast_hits.trigger_hits, &mut report.events.triggers);
        }

        let prev_position = position;
        let prev_velocity = new_velocity;

        let speed_sq = new_velocity.norm_squared();
        let min_time = if speed_sq > SOLVER_EPSILON_SQ {
            MIN_TRAVEL_DISTANCE / speed_sq.sqrt()
        } else {
            0.0
        };
        let params = SolverParams {
            time_budget: remaining,
            min_time,
            up: input.up,
            max_speed: input.max_speed,
            use_constraint_velocities: true,
        };
        let mut integrated =
            simplex::solve(&params, &mut constraints, &mut position, &mut new_velocity);

        if affects_other_bodies || events.contacts {
            record_contacts(
                bodies,
                input,
                mass,
                affects_other_bodies,
                events.contacts,
                &prev_velocity,
                &constraints,
                writer,
                &mut report.events.contacts,
            );
        }

        // The solver only knows about the planes it was given: check the path it chose.
        let new_displacement = position - prev_position;
        let travel_sq = new_displacement.norm_squared();
        if travel_sq > SOLVER_EPSILON {
            world.cast_shape(
                &query,
                &Transform::new(prev_position, rotation).iso(),
                &new_displacement,
                &mut cast_hits,
            );
            let first_blocking = cast_hits
                .hits
                .iter()
                .filter(|hit| !is_constrained(&constraints, hit))
                .map(|hit| hit.fraction)
                .min_by(f32::total_cmp);
            if let Some(fraction) = first_blocking {
                // Stop short of the contact by the skin width.
                let fraction = (fraction - input.skin_width / travel_sq.sqrt()).max(0.0);
                position = prev_position + new_displacement * fraction;
                integrated *= fraction;
            }
        }

        remaining -= integrated;
    }

    transform.translation = position;
    *velocity = new_velocity;
    report.remaining_time = remaining.max(0.0);
    report
}

#[inline]
fn is_constrained(constraints: &[SurfaceConstraint], hit: &CastHit) -> bool {
    constraints
        .iter()
        .any(|c| c.same_collider(hit.body, hit.key))
}

fn record_triggers(hits: &[CastHit], out: &mut Vec<TriggerEvent>) {
    for hit in hits {
        if out.iter().any(|t| t.body == hit.body && t.key == hit.key) {
            continue;
        }
        out.push(TriggerEvent {
            body: hit.body,
            key: hit.key,
            position: hit.position,
        });
    }
}

/// Compute impulses and contact events for the planes the solver reached.
///
/// `character_velocity` is the agent's velocity before the solve.
fn record_contacts(
    bodies: &impl RigidBodyStore,
    input: &StepInput,
    mass: f32,
    affects_other_bodies: bool,
    record_events: bool,
    character_velocity: &Vec3,
    constraints: &[SurfaceConstraint],
    writer: &mut ImpulseWriter,
    events: &mut Vec<ContactEvent>,
) {
    // Max-slope planes duplicate the raw plane of the same collider.
    for c in constraints.iter().filter(|c| c.touched && !c.is_max_slope) {
        let impulse = if affects_other_bodies && bodies.inv_mass(c.body) > 0.0 {
            contact_impulse(bodies, input, mass, character_velocity, c)
        } else {
            Vec3::zeros()
        };
        if impulse != Vec3::zeros() {
            writer.push(c.body, impulse, c.hit_position);
        }

        if record_events {
            match events
                .iter_mut()
                .find(|e| e.body == c.body && e.key == c.key)
            {
                Some(existing) => existing.impulse += impulse,
                None => events.push(ContactEvent {
                    body: c.body,
                    key: c.key,
                    normal: c.plane.normal,
                    position: c.hit_position,
                    impulse,
                }),
            }
        }
    }
}

/// Impulse on the body behind `c` that stops it approaching the agent, plus the agent's weight
/// while gravity presses the agent into it.
fn contact_impulse(
    bodies: &impl RigidBodyStore,
    input: &StepInput,
    mass: f32,
    character_velocity: &Vec3,
    c: &SurfaceConstraint,
) -> Vec3 {
    let normal = c.plane.normal;
    let point_rel_vel = bodies.velocity_at_point(c.body, &c.hit_position) - character_velocity;
    let projected = point_rel_vel.dot(&normal);

    let mut delta_velocity = -projected * input.damping;
    if c.penetration < 0.0 {
        delta_velocity += (c.penetration / input.dt) * input.tau;
    }

    let mut impulse = Vec3::zeros();
    if delta_velocity < 0.0 {
        let inv_mass = inv_mass_at_point(bodies, c.body, &c.hit_position, &normal);
        if inv_mass > 0.0 {
            impulse = normal * (delta_velocity / inv_mass);
        }
    }

    let mut rel_vel_n = (input.gravity * input.dt).dot(&normal);
    if projected < 0.0 {
        rel_vel_n -= projected;
    }
    if rel_vel_n < 0.0 {
        impulse += normal * (rel_vel_n * mass);
    }

    impulse
}
