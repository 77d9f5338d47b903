pub mod bodies;
pub mod collision;
pub mod config;
pub mod constraint;
pub mod controller;
pub mod impulse;
pub mod integrate;
pub mod simplex;
pub mod support;

pub use bodies::{RigidBodyStore, insert_body, inv_mass_at_point};
pub use collision::{
    BodyIndex, ColliderDef, ColliderKey, ColliderShapeDef, CollisionQueries, CollisionWorld,
    Transform, Vec3, WorldBuildError,
};
pub use config::{ControllerSettings, SettingsError};
pub use constraint::SurfaceConstraint;
pub use controller::{Agent, AgentIntent, AgentStepReport, step_agent, step_agents};
pub use impulse::{DeferredImpulse, ImpulseChannel, ImpulseWriter};
pub use integrate::{
    ContactEvent, EventRequest, IntegrateReport, StepEvents, StepInput, TriggerEvent,
    collide_and_integrate,
};
pub use simplex::SolverParams;
pub use support::{SupportReport, SupportState, check_support};
