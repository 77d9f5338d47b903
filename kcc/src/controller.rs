//! Character step driver: support check, velocity update, collide-and-integrate.
//!
//! [`step_agents`] runs a whole batch. Agents are solved concurrently against a read-only world and
//! body store, each writing impulses to its own partition; the impulses are applied to the bodies
//! once every agent is done.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use rapier3d::parry::shape::SharedShape;

use crate::bodies::RigidBodyStore;
use crate::collision::{BodyIndex, CollisionQueries, Transform, Vec3};
use crate::config::{ControllerSettings, SettingsError};
use crate::impulse::{ImpulseChannel, ImpulseWriter};
use crate::integrate::{IntegrateReport, collide_and_integrate};
use crate::support::{SupportReport, SupportState, check_support};

/// A character moved by the controller.
#[derive(Clone)]
pub struct Agent {
    pub transform: Transform,
    pub velocity: Vec3,
    pub settings: ControllerSettings,
    pub shape: SharedShape,
    /// Body carrying the agent's own collider, if it has one in the world.
    pub body: Option<BodyIndex>,
    /// Support found at the start of the last step.
    pub support: SupportReport,
}

impl Agent {
    /// A resting agent. Fails if `settings` would not be usable by the solver.
    pub fn new(
        shape: SharedShape,
        transform: Transform,
        settings: ControllerSettings,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            transform,
            velocity: Vec3::zeros(),
            support: SupportReport::unsupported(settings.up),
            settings,
            shape,
            body: None,
        })
    }

    /// Exclude `body` (the agent's own collider) from every query.
    pub fn with_body(mut self, body: BodyIndex) -> Self {
        self.body = Some(body);
        self
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("transform", &self.transform)
            .field("velocity", &self.velocity)
            .field("shape", &self.shape.shape_type())
            .field("body", &self.body)
            .field("support", &self.support.state)
            .finish_non_exhaustive()
    }
}

/// What the agent wants to do this step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AgentIntent {
    /// World-space velocity the agent would like to move at.
    pub desired_velocity: Vec3,
    /// Launch speed along up, honored only while supported.
    pub jump_speed: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentStepReport {
    pub support: SupportReport,
    pub integrate: IntegrateReport,
}

/// Step one agent by `dt`, recording impulses on other bodies into `writer`.
pub fn step_agent(
    world: &impl CollisionQueries,
    bodies: &impl RigidBodyStore,
    agent: &mut Agent,
    intent: &AgentIntent,
    dt: f32,
    writer: &mut ImpulseWriter,
) -> AgentStepReport {
    debug_assert!(agent.settings.validate().is_ok(), "invalid agent settings");

    let settings = &agent.settings;
    let input = settings.step_input(dt, agent.body);
    let up = settings.up;

    let support = check_support(world, bodies, &*agent.shape, &agent.transform, &input);
    agent.support = support;

    let mut velocity = match support.state {
        SupportState::Supported => {
            let mut velocity =
                along_surface(&intent.desired_velocity, &support.surface_normal, &up)
                    + support.surface_velocity;
            match intent.jump_speed {
                Some(jump) => velocity += up * jump,
                // Keeps the agent pressed onto the ground it stands on.
                None => velocity += settings.gravity * dt,
            }
            velocity
        }
        SupportState::Sliding | SupportState::Unsupported => {
            let mut velocity = agent.velocity + settings.gravity * dt;
            let current = horizontal(&velocity, &up);
            let desired = horizontal(&intent.desired_velocity, &up);
            velocity += (desired - current) * settings.air_control;
            velocity
        }
    };

    let integrate = collide_and_integrate(
        world,
        bodies,
        &*agent.shape,
        &input,
        settings.mass,
        settings.affects_other_bodies,
        settings.events,
        &mut agent.transform,
        &mut velocity,
        writer,
    );
    agent.velocity = velocity;

    AgentStepReport { support, integrate }
}

/// Step every agent of a batch by `dt`, then apply the impulses they recorded to `bodies`.
///
/// `intents[i]` drives `agents[i]`. Reports come back in agent order.
pub fn step_agents<B>(
    world: &impl CollisionQueries,
    bodies: &mut B,
    agents: &mut [Agent],
    intents: &[AgentIntent],
    dt: f32,
) -> Vec<AgentStepReport>
where
    B: RigidBodyStore + Sync,
{
    if agents.len() != intents.len() {
        log::warn!(
            "step_agents: {} agents but {} intents, ignoring step",
            agents.len(),
            intents.len()
        );
        return Vec::new();
    }
    if !(dt > 0.0 && dt.is_finite()) {
        log::warn!("step_agents: ignoring step with dt = {dt}");
        return Vec::new();
    }

    let mut channel = ImpulseChannel::new(agents.len());
    let reports = solve_batch(world, &*bodies, agents, intents, dt, channel.writers_mut());

    log::trace!(
        "step_agents: {} agents, {} impulses",
        reports.len(),
        channel.len()
    );
    channel.apply(bodies);

    reports
}

#[cfg(feature = "parallel")]
fn solve_batch<B: RigidBodyStore + Sync>(
    world: &impl CollisionQueries,
    bodies: &B,
    agents: &mut [Agent],
    intents: &[AgentIntent],
    dt: f32,
    writers: &mut [ImpulseWriter],
) -> Vec<AgentStepReport> {
    agents
        .par_iter_mut()
        .zip(intents.par_iter())
        .zip(writers.par_iter_mut())
        .map(|((agent, intent), writer)| step_agent(world, bodies, agent, intent, dt, writer))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn solve_batch<B: RigidBodyStore + Sync>(
    world: &impl CollisionQueries,
    bodies: &B,
    agents: &mut [Agent],
    intents: &[AgentIntent],
    dt: f32,
    writers: &mut [ImpulseWriter],
) -> Vec<AgentStepReport> {
    agents
        .iter_mut()
        .zip(intents)
        .zip(writers)
        .map(|((agent, intent), writer)| step_agent(world, bodies, agent, intent, dt, writer))
        .collect()
}

/// `desired` redirected along the plane with normal `normal`, keeping its horizontal speed.
fn along_surface(desired: &Vec3, normal: &Vec3, up: &Vec3) -> Vec3 {
    let flat = horizontal(desired, up);
    let speed = flat.norm();
    if speed <= f32::EPSILON {
        return Vec3::zeros();
    }
    let tangent = flat - normal * flat.dot(normal);
    tangent
        .try_normalize(1.0e-6)
        .map_or_else(Vec3::zeros, |dir| dir * speed)
}

#[inline]
fn horizontal(v: &Vec3, up: &Vec3) -> Vec3 {
    v - up * v.dot(up)
}
