/*!
Collision root module.

Everything the controller needs to ask of the world goes through the
[`CollisionQueries`] trait: shape casts and distance queries returning
world-space hits tagged with the owning body and a per-body collider key.
[`CollisionWorld`] is the parry-backed implementation. The code is split as:

- types:        math aliases, body/collider identifiers, hit records
- settings:     solver tolerances and controller defaults
- query:        the query trait, query shapes and filters
- broad:        broad-phase helpers (BVH over finite colliders, swept AABBs)
- narrow_phase: thin wrappers over parry queries (shape cast, contact)
- world:        collider definitions and the collision world
*/

pub mod broad;
pub mod narrow_phase;
pub mod query;
pub mod settings;
pub mod types;
pub mod world;

// Re-export commonly used types and functions.
pub use query::{CastHits, CollisionQueries, QueryFilter, QueryShape};
pub use types::{
    BodyIndex, CastHit, ColliderKey, DistanceHit, Iso, Mat3, Point, Quat, Transform, Vec3,
};
pub use world::{
    ColliderDef, ColliderShapeDef, CollisionWorld, WorldBuildError, cuboid_from_pose,
    plane_from_pose,
};
